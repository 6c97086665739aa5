//! Integration test: discover skills from a directory tree on disk, then query and reload.
//! Uses only builtin handlers and `echo`; no model server needed.

use skillful::skills::{
    BuiltinSource, DirectorySource, RegistryError, SkillRegistry, SkillSource, Visibility,
};
use std::path::{Path, PathBuf};

fn temp_skills_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("skillful-discovery-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create skills dir");
    dir
}

fn write_unit(root: &Path, dir: &str, skill_md: &str) -> PathBuf {
    let p = root.join(dir);
    std::fs::create_dir_all(&p).expect("create unit dir");
    std::fs::write(p.join("SKILL.md"), skill_md).expect("write SKILL.md");
    p
}

fn populated() -> PathBuf {
    let root = temp_skills_dir();
    write_unit(&root, "a_calc", "---\nname: calc\nbuiltin: calculator\ntags: [math]\n---\n");
    write_unit(
        &root,
        "b_clock",
        "---\nname: clock\ndescription: Reads the local clock\nbuiltin: time\ntags: [time]\n---\n",
    );
    // Same skill name as a_calc: rejected, a_calc stays.
    write_unit(&root, "c_calc_again", "---\nname: calc\nbuiltin: text_processor\n---\n");
    write_unit(&root, "d_broken", "---\nname: [unclosed\n---\n");
    let echo = write_unit(
        &root,
        "e_greeter",
        "---\nname: greeter\ndescription: Greets people\nvisibility: private\n---\n",
    );
    std::fs::write(
        echo.join("tools.json"),
        r#"{
            "tools": [{"name": "greet", "description": "Say hello",
                       "parameters": {"type": "object", "properties": {"who": {"type": "string"}}, "required": ["who"]}}],
            "allowlist": {"echo": ["hello"]},
            "execution": [{"tool": "greet", "binary": "echo", "subcommand": "hello", "args": [{"param": "who"}]}]
        }"#,
    )
    .expect("write tools.json");
    std::fs::create_dir_all(root.join("f_notes")).expect("create non-skill dir");
    root
}

#[test]
fn discovery_skips_bad_units_and_keeps_first_duplicate() {
    let root = populated();
    let registry = SkillRegistry::new();
    let report = registry
        .discover(&DirectorySource::new(&root))
        .expect("directory is reachable");

    assert_eq!(report.loaded, vec!["calc", "clock", "greeter"]);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().any(|e| e.reason.contains("already registered")));
    assert!(report.errors.iter().any(|e| e.unit.ends_with("d_broken")));

    let calc = registry.lookup("calc").expect("calc registered");
    assert_eq!(calc.operations.len(), 1);
    assert_eq!(calc.operations[0].name, "calculator");
}

#[test]
fn search_and_visibility_over_discovered_skills() {
    let registry = SkillRegistry::new();
    registry
        .discover(&DirectorySource::new(populated()))
        .expect("directory is reachable");

    let by_tag: Vec<String> = registry.search("", &["math"]).iter().map(|s| s.name.clone()).collect();
    assert_eq!(by_tag, vec!["calc"]);
    let by_query: Vec<String> = registry
        .search::<&str>("clo", &[])
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(by_query, vec!["clock"]);

    let public: Vec<String> = registry
        .list_visible(&[Visibility::Public])
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(public, vec!["calc", "clock"]);
}

#[test]
fn command_operations_run_through_the_allowlist() {
    let registry = SkillRegistry::new();
    registry
        .discover(&DirectorySource::new(populated()))
        .expect("directory is reachable");
    let snapshot = registry.snapshot();

    let out = snapshot
        .invoke("greet", &serde_json::json!({"who": "world"}))
        .expect("echo runs");
    assert_eq!(out.trim(), "hello world");
    assert_eq!(
        snapshot.invoke("calculator", &serde_json::json!({"expression": "2 * (3 + 4)"})),
        Ok("Result: 14".to_string())
    );
    assert!(snapshot.invoke("greet", &serde_json::json!({})).is_err());
}

#[test]
fn reload_replaces_index_and_keeps_old_snapshots_intact() {
    let root = populated();
    let registry = SkillRegistry::new();
    registry
        .discover(&DirectorySource::new(&root))
        .expect("directory is reachable");
    let before = registry.snapshot();

    std::fs::remove_dir_all(root.join("b_clock")).expect("remove clock");
    let dir = DirectorySource::new(&root);
    let builtins = BuiltinSource::new().without(["calculator", "text_processor"]);
    let sources: [&dyn SkillSource; 2] = [&dir, &builtins];
    let report = registry.reload(&sources).expect("sources reachable");

    assert_eq!(report.loaded, vec!["calc", "greeter", "example", "time"]);
    assert!(before.contains("clock"));
    assert!(!registry.contains("clock"));

    let gone = DirectorySource::new(root.join("does-not-exist"));
    let err = registry.reload(&[&gone]).expect_err("missing dir is unreachable");
    assert!(matches!(err, RegistryError::SourceUnreachable { .. }));
    assert_eq!(registry.len(), 4);
}
