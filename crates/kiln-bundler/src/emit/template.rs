//! Output file-name templates.
//!
//! Supported placeholders: `[name]`, `[id]`, `[chunkhash]`, `[contenthash]`
//! and `[hash]`; the hash placeholders accept a length, as in
//! `[chunkhash:8]`. Anything else in brackets is copied through unchanged.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Name,
    Id,
    ChunkHash,
    ContentHash,
    BuildHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder, Option<usize>),
}

/// Values substituted into a template for one chunk.
#[derive(Debug, Clone, Copy)]
pub struct TemplateData<'a> {
    pub name: &'a str,
    pub id: usize,
    pub chunk_hash: &'a str,
    pub content_hash: &'a str,
    pub build_hash: &'a str,
}

/// A parsed file-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameTemplate {
    segments: Vec<Segment>,
}

impl FileNameTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open..];
            match after.find(']').and_then(|close| {
                parse_placeholder(&after[1..close]).map(|placeholder| (close, placeholder))
            }) {
                Some((close, (placeholder, len))) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(placeholder, len));
                    rest = &after[close + 1..];
                }
                None => {
                    literal.push('[');
                    rest = &after[1..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn render(&self, data: &TemplateData<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(Placeholder::Name, _) => out.push_str(data.name),
                Segment::Placeholder(Placeholder::Id, _) => out.push_str(&data.id.to_string()),
                Segment::Placeholder(Placeholder::ChunkHash, len) => {
                    out.push_str(truncate(data.chunk_hash, *len))
                }
                Segment::Placeholder(Placeholder::ContentHash, len) => {
                    out.push_str(truncate(data.content_hash, *len))
                }
                Segment::Placeholder(Placeholder::BuildHash, len) => {
                    out.push_str(truncate(data.build_hash, *len))
                }
            }
        }
        out
    }
}

fn parse_placeholder(inner: &str) -> Option<(Placeholder, Option<usize>)> {
    let (key, len) = match inner.split_once(':') {
        Some((key, len)) => (key, Some(len.parse::<usize>().ok()?)),
        None => (inner, None),
    };
    let placeholder = match key {
        "name" => Placeholder::Name,
        "id" => Placeholder::Id,
        "chunkhash" => Placeholder::ChunkHash,
        "contenthash" => Placeholder::ContentHash,
        "hash" => Placeholder::BuildHash,
        _ => return None,
    };
    if len.is_some() && matches!(placeholder, Placeholder::Name | Placeholder::Id) {
        return None;
    }
    Some((placeholder, len))
}

fn truncate(hash: &str, len: Option<usize>) -> &str {
    match len {
        Some(len) if len < hash.len() => &hash[..len],
        _ => hash,
    }
}
