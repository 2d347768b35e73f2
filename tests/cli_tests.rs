use std::{fs, path::Path};

use assert_cmd::Command;
use graphimport::{Graph, Index, Key, Node, Relationship, SchemaDeclaration, SqliteStore};
use tempfile::TempDir;

fn person(id: &str) -> Key {
    Key::with_property("Person", "id", id)
}

fn write_fragment(dir: &Path, name: &str, graph: &Graph) {
    fs::write(
        dir.join(name),
        serde_json::to_string_pretty(graph).expect("serialize"),
    )
    .expect("write fragment");
}

fn fragment_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let mut first = Graph::new();
    first.push_schema(SchemaDeclaration::unique(Index::with_property("Person", "id")));
    first.push_node(Node::new(person("A1")));
    first.push_relationship(Relationship::new("KNOWS", person("A1"), person("A2")));
    write_fragment(dir.path(), "001.json", &first);

    let mut second = Graph::new();
    second.push_node(Node::new(person("A2")));
    second.push_relationship(Relationship::new("KNOWS", person("A2"), person("X")));
    write_fragment(dir.path(), "002.json", &second);
    dir
}

fn graphimport(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_graphimport"));
    cmd.current_dir(workdir)
        .env_remove("RUST_LOG")
        .env_remove("GRAPHIMPORT_DATABASE");
    cmd
}

#[test]
fn help_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    graphimport(dir.path()).arg("--help").assert().success();
}

#[test]
fn import_prints_statistics_and_unresolved_report() {
    let fragments = fragment_dir();
    let work = TempDir::new().expect("workdir");
    let db = work.path().join("graph.db");
    let report = work.path().join("unresolved.txt");

    let output = graphimport(work.path())
        .args(["--database", db.to_str().expect("utf8")])
        .args(["import", "--fragments"])
        .arg(fragments.path())
        .args(["--report", report.to_str().expect("utf8")])
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 nodes have been created."));
    assert!(stdout.contains("1 relationships have been created."));
    assert!(stdout.contains("1 relationship keys are unknown in this graph."));

    let unresolved = fs::read_to_string(&report).expect("report");
    assert_eq!(unresolved, "Person.id.X\n");

    let store = SqliteStore::open_read_only(&db).expect("store");
    assert_eq!(store.node_count().expect("nodes"), 2);
    assert_eq!(store.relationship_count().expect("edges"), 1);
}

#[test]
fn import_reads_config_file_from_workdir() {
    let fragments = fragment_dir();
    let work = TempDir::new().expect("workdir");
    fs::write(
        work.path().join("import.toml"),
        format!(
            "database = \"configured.db\"\nfragments = {:?}\n",
            fragments.path().to_str().expect("utf8")
        ),
    )
    .expect("config");

    graphimport(work.path()).arg("import").assert().success();
    assert!(work.path().join("configured.db").exists());
    assert!(work.path().join("log_unknown_relations.txt").exists());
}

#[test]
fn missing_explicit_config_fails() {
    let work = TempDir::new().expect("workdir");
    graphimport(work.path())
        .args(["--config", "nope.toml", "stats"])
        .assert()
        .failure();
}

#[test]
fn bad_fragment_is_skipped_unless_fail_fast() {
    let fragments = fragment_dir();
    fs::write(fragments.path().join("000.json"), "{ broken").expect("write");
    let work = TempDir::new().expect("workdir");

    graphimport(work.path())
        .args(["--database", "skip.db", "import", "--fragments"])
        .arg(fragments.path())
        .assert()
        .success();
    let store = SqliteStore::open_read_only(work.path().join("skip.db")).expect("store");
    assert_eq!(store.node_count().expect("nodes"), 2);

    graphimport(work.path())
        .args(["--database", "strict.db", "import", "--fail-fast", "--fragments"])
        .arg(fragments.path())
        .assert()
        .failure();
}

#[test]
fn stats_and_check_inspect_existing_store() {
    let fragments = fragment_dir();
    let work = TempDir::new().expect("workdir");
    graphimport(work.path())
        .args(["--database", "graph.db", "import", "--fragments"])
        .arg(fragments.path())
        .assert()
        .success();

    let output = graphimport(work.path())
        .args(["--database", "graph.db", "stats"])
        .output()
        .expect("stats");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "nodes=2 relationships=1"
    );

    graphimport(work.path())
        .args(["--database", "graph.db", "check"])
        .assert()
        .success();

    rusqlite::Connection::open(work.path().join("graph.db"))
        .expect("raw")
        .execute("DELETE FROM graph_nodes WHERE id = 1", [])
        .expect("delete");
    graphimport(work.path())
        .args(["--database", "graph.db", "check"])
        .assert()
        .code(2);
}

#[test]
fn stats_on_missing_database_fails() {
    let work = TempDir::new().expect("workdir");
    graphimport(work.path())
        .args(["--database", "absent.db", "stats"])
        .assert()
        .failure();
}
