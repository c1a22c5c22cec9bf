//! Whole builds: tree shaking, failure handling, determinism and writing.

#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use kiln_bundler::{
    BundleOptions, Bundler, Chunk, EmitError, EmitHook, Error, MemoryRuntime, NativeRuntime,
    Plugin, PluginPhase, TreeShakingMode,
};

fn barrel_project() -> MemoryRuntime {
    MemoryRuntime::new("/app")
        .with_file(
            "main.js",
            "import { used } from './lib/index.js';\nconsole.log(used);\n",
        )
        .with_file(
            "lib/index.js",
            "export { used } from './used.js';\n\
             export { dead } from './dead.js';\n\
             export { noisy } from './noisy.js';\n",
        )
        .with_file(
            "lib/used.js",
            "export const used = 'USED_MARKER';\nexport const cube = () => 'CUBE_MARKER';\n",
        )
        .with_file("lib/dead.js", "export const dead = () => 'DEAD_MARKER';\n")
        .with_file(
            "lib/noisy.js",
            "window.NOISY_MARKER = true;\nexport const noisy = 1;\n",
        )
}

fn main_only() -> BundleOptions {
    BundleOptions::default().entry("main", "./main.js")
}

#[tokio::test]
async fn unused_pure_module_is_dropped() {
    let runtime = Arc::new(barrel_project());
    let output = Bundler::new(main_only())
        .runtime(runtime)
        .build()
        .await
        .unwrap();

    let code = &output.artifact("main").unwrap().code;
    assert!(code.contains("USED_MARKER"));
    assert!(!code.contains("DEAD_MARKER"));
    // Top-level side effects keep the module in conservative mode.
    assert!(code.contains("NOISY_MARKER"));
    // Unused bindings of retained modules are cut as well.
    assert!(!code.contains("CUBE_MARKER"));
    assert!(!code.contains("dead.js"));
    // The barrel still evaluates the side-effecting module it re-exported.
    assert!(code.contains("import \"./noisy.js\";"));

    let main = output.plan.chunk_by_name("main").unwrap();
    assert_eq!(main.eliminated.len(), 1);
    assert!(
        !output
            .manifest
            .chunk("main")
            .unwrap()
            .modules
            .contains(&"./lib/dead.js".to_string())
    );
}

#[tokio::test]
async fn aggressive_mode_drops_side_effecting_module() {
    let mut options = main_only();
    options.tree_shaking = TreeShakingMode::Aggressive;

    let output = Bundler::new(options)
        .runtime(Arc::new(barrel_project()))
        .build()
        .await
        .unwrap();

    let code = &output.artifact("main").unwrap().code;
    assert!(code.contains("USED_MARKER"));
    assert!(!code.contains("NOISY_MARKER"));
    assert!(!code.contains("DEAD_MARKER"));
    assert!(!code.contains("noisy.js"));
}

#[tokio::test]
async fn live_exports_are_annotated() {
    let output = Bundler::new(main_only())
        .runtime(Arc::new(barrel_project()))
        .build()
        .await
        .unwrap();

    let code = &output.artifact("main").unwrap().code;
    assert!(code.contains("/* exports used: used */"));
    assert!(code.contains("/* exports used: (none) */"));
}

#[tokio::test]
async fn unresolved_import_leaves_previous_output_alone() {
    let runtime = Arc::new(
        MemoryRuntime::new("/app")
            .with_file("main.js", "import x from './missing';\nconsole.log(x);\n")
            .with_file("dist/manifest.json", "{\"previous\": true}\n"),
    );

    let err = Bundler::new(main_only())
        .runtime(runtime.clone())
        .build_and_write()
        .await
        .unwrap_err();

    match err {
        Error::Resolution(err) => {
            assert_eq!(err.specifier, "./missing");
            assert_eq!(err.origin, std::path::PathBuf::from("/app/main.js"));
        }
        other => panic!("expected resolution error, got {other:?}"),
    }
    assert_eq!(
        runtime.file_string("/app/dist/manifest.json").as_deref(),
        Some("{\"previous\": true}\n")
    );
    assert_eq!(runtime.paths().len(), 2);
}

#[tokio::test]
async fn syntax_error_aborts_build() {
    let runtime = Arc::new(
        MemoryRuntime::new("/app").with_file("main.js", "import { from './a.js';\n"),
    );

    let err = Bundler::new(main_only())
        .runtime(runtime.clone())
        .build_and_write()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(_)), "{err:?}");
    assert!(runtime.file("/app/dist/manifest.json").is_none());
}

#[tokio::test]
async fn repeated_builds_are_byte_identical() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let runtime = Arc::new(barrel_project());
        let bundler = Bundler::new(main_only()).runtime(runtime.clone());
        bundler.build_and_write().await.unwrap();

        let mut files = Vec::new();
        for path in runtime.paths() {
            if path.starts_with("/app/dist") {
                files.push((path.clone(), runtime.file(&path).unwrap()));
            }
        }
        runs.push(files);
    }

    assert_eq!(runs[0].len(), 2);
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn existing_output_blocks_without_overwrite() {
    let runtime = Arc::new(barrel_project());
    let mut options = main_only();
    options.output.overwrite = false;
    let bundler = Bundler::new(options).runtime(runtime.clone());

    bundler.build_and_write().await.unwrap();
    let err = bundler.build_and_write().await.unwrap_err();
    assert!(matches!(err, Error::OutputExists(_)), "{err:?}");
}

struct Banner;

impl EmitHook for Banner {
    fn name(&self) -> &str {
        "banner"
    }

    fn process(&self, chunk: &Chunk, code: String) -> Result<String, EmitError> {
        Ok(format!("/*! {} */\n{code}", chunk.name))
    }
}

struct Reject;

impl EmitHook for Reject {
    fn name(&self) -> &str {
        "reject"
    }

    fn process(&self, chunk: &Chunk, _code: String) -> Result<String, EmitError> {
        Err(EmitError::hook("reject", &chunk.name, "not today"))
    }
}

#[tokio::test]
async fn emit_hooks_run_before_hashing() {
    let plain = Bundler::new(main_only())
        .runtime(Arc::new(barrel_project()))
        .build()
        .await
        .unwrap();
    let bannered = Bundler::new(main_only())
        .runtime(Arc::new(barrel_project()))
        .plugin(PluginPhase::PostProcess, Plugin::emit(Banner))
        .build()
        .await
        .unwrap();

    let artifact = bannered.artifact("main").unwrap();
    assert!(artifact.code.starts_with("/*! main */\n"));
    assert_eq!(artifact.hash, blake3::hash(artifact.code.as_bytes()).to_hex().to_string());
    assert_ne!(artifact.hash, plain.artifact("main").unwrap().hash);
    assert_ne!(bannered.manifest.hash, plain.manifest.hash);
}

#[tokio::test]
async fn failing_emit_hook_writes_nothing() {
    let runtime = Arc::new(barrel_project());
    let err = Bundler::new(main_only())
        .runtime(runtime.clone())
        .plugin(PluginPhase::Render, Plugin::emit(Reject))
        .build_and_write()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Emit(EmitError::Hook { .. })), "{err:?}");
    assert!(runtime.paths().iter().all(|path| !path.starts_with("/app/dist")));
}

#[tokio::test]
async fn writes_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("main.js"), "import { a } from './a.js';\nconsole.log(a);\n").unwrap();
    std::fs::write(root.join("a.js"), "export const a = 1;\n").unwrap();

    let bundler = Bundler::new(main_only()).runtime(Arc::new(NativeRuntime::with_cwd(root)));
    let output = bundler.build_and_write().await.unwrap();

    let manifest = std::fs::read_to_string(root.join("dist/manifest.json")).unwrap();
    assert_eq!(manifest, output.manifest.to_json().unwrap());

    let entry = output.manifest.entry_file("main").unwrap();
    let code = std::fs::read_to_string(root.join("dist").join(entry)).unwrap();
    assert_eq!(code, output.artifact("main").unwrap().code);
    assert!(!root.join("dist").join(format!("{entry}.tmp")).exists());
}
