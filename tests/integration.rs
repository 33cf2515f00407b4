use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const RELEASE: &str = "CC-MAIN-2014-49";

fn ledger_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_crawl-ledger"))
}

fn setup_test_env(with_runner: bool) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Three segments; the first one holds two data files.
    let manifest_dir = root.join("manifests");
    fs::create_dir_all(&manifest_dir).unwrap();
    let prefix = format!("common-crawl/crawl-data/{}/segments", RELEASE);
    fs::write(
        manifest_dir.join(format!("{}.paths", RELEASE)),
        format!(
            "{p}/1416400372202/warc/CC-MAIN-00000.warc.gz\n\
             {p}/1416400372202/warc/CC-MAIN-00001.warc.gz\n\
             {p}/1416400372490/warc/CC-MAIN-00000.warc.gz\n\
             {p}/1416400372490/wat/CC-MAIN-00000.warc.wat.gz\n\
             {p}/1416400372575/warc/CC-MAIN-00000.warc.gz\n",
            p = prefix
        ),
    )
    .unwrap();

    let runner = if with_runner {
        r#"
[runner]
command = "sh"
args = ["-c", "cat > /dev/null; echo j-CLITEST"]
"#
    } else {
        ""
    };

    let config_content = format!(
        r#"[db]
path = "{root}/data/crawl-ledger.sqlite"

[dataset]
manifest = "{root}/manifests/{{release}}.paths"
include_globs = ["**/*.warc.gz"]

[output]
root = "s3://crawl-out"

[steps.parse]
jar = "s3://crawl-out/jar/parser.jar"
main_class = "com.example.Parse"
input_filter = "warc/*.warc.gz"

[steps.combine]
jar = "s3://crawl-out/jar/parser.jar"
main_class = "com.example.Combine"
input_filter = "part-*"

[cluster.master]
instance_type = "m1.medium"
instance_count = 1

[cluster.core]
instance_type = "m1.medium"
instance_count = 2
use_spot_instances = true
bid_price = 0.12
{runner}"#,
        root = root.display(),
        runner = runner
    );

    let config_path = config_dir.join("crawl-ledger.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ledger(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ledger_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crawl-ledger binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn job_name(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("Job: "))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| panic!("no job name in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env(false);

    let (stdout, stderr, success) = run_ledger(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data/crawl-ledger.sqlite").exists());

    let (_, stderr, success) = run_ledger(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_discover_is_idempotent() {
    let (_tmp, config_path) = setup_test_env(false);

    let (stdout, stderr, success) = run_ledger(&config_path, &["discover", RELEASE]);
    assert!(success, "discover failed: {}", stderr);
    assert!(stdout.contains("3 new segments, 3 total"), "{}", stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["discover", RELEASE]);
    assert!(success);
    assert!(stdout.contains("0 new segments, 3 total"), "{}", stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["discover", "CC-MAIN-2099-01"]);
    assert!(success);
    assert!(stdout.contains("no published segments"), "{}", stdout);
}

#[test]
fn test_plan_submit_and_status() {
    let (_tmp, config_path) = setup_test_env(true);

    // Planning discovers the release on first use.
    let (stdout, stderr, success) = run_ledger(
        &config_path,
        &["plan", "parse", RELEASE, "--max-segments", "2", "--max-files", "3"],
    );
    assert!(success, "plan parse failed: {}", stderr);
    assert!(
        stdout.contains("Segments: 2 Parsing: 3 files per segment"),
        "{}",
        stdout
    );
    let parse_job = job_name(&stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("to parse 3, parsed 0, total 3"), "{}", stdout);

    let (stdout, stderr, success) = run_ledger(&config_path, &["submit", &parse_job]);
    assert!(success, "submit failed: {}", stderr);
    assert!(stdout.contains("j-CLITEST"), "{}", stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("to parse 1, parsed 2, total 3"), "{}", stdout);
    assert!(stdout.contains(&format!("{} Launched:", parse_job)), "{}", stdout);

    let (_, stderr, success) = run_ledger(&config_path, &["submit", &parse_job]);
    assert!(!success);
    assert!(stderr.contains("already submitted"), "{}", stderr);

    // Only the remaining segment is left to plan.
    let (stdout, stderr, success) = run_ledger(&config_path, &["plan", "parse", RELEASE]);
    assert!(success, "second plan failed: {}", stderr);
    assert!(stdout.contains("Segments: 1 Parsing: all files"), "{}", stdout);

    let (stdout, stderr, success) =
        run_ledger(&config_path, &["plan", "combine", &parse_job]);
    assert!(success, "plan combine failed: {}", stderr);
    assert!(stdout.contains("Combining: 2 segments"), "{}", stdout);
    let combine_job = job_name(&stdout);

    let (stdout, stderr, success) = run_ledger(&config_path, &["show", &combine_job]);
    assert!(success, "show failed: {}", stderr);
    assert!(stdout.contains("Combining 1 jobs"), "{}", stdout);
    assert!(stdout.contains("State:       planned"), "{}", stdout);

    let (stdout, _, success) = run_ledger(&config_path, &["reset", RELEASE]);
    assert!(success);
    assert!(stdout.contains("2 segments reset"), "{}", stdout);
}

#[test]
fn test_plan_parse_selected_segments() {
    let (_tmp, config_path) = setup_test_env(false);

    let (stdout, stderr, success) = run_ledger(
        &config_path,
        &[
            "plan",
            "parse",
            RELEASE,
            "--segments",
            "1416400372575,0000000000000",
        ],
    );
    assert!(success, "plan parse failed: {}", stderr);
    assert!(stdout.contains("Segments: 1 "), "{}", stdout);

    let job = job_name(&stdout);
    let (stdout, _, success) = run_ledger(&config_path, &["show", &job]);
    assert!(success);
    assert!(stdout.contains("Segment: 1416400372575"), "{}", stdout);
}

#[test]
fn test_plan_parse_rejects_oversized_selection() {
    let (_tmp, config_path) = setup_test_env(false);

    let names: Vec<String> = (0..257).map(|i| format!("{}", 1416400000000u64 + i)).collect();
    let selection = names.join(",");
    let (stdout, stderr, success) = run_ledger(
        &config_path,
        &["plan", "parse", RELEASE, "--segments", &selection],
    );
    assert!(!success, "oversized selection was planned: {}", stdout);
    assert!(
        stderr.contains("at most 256 segments per job; 257 selected"),
        "{}",
        stderr
    );
    assert!(!stdout.contains("Job: "), "{}", stdout);
}

#[test]
fn test_submit_requires_runner() {
    let (_tmp, config_path) = setup_test_env(false);

    let (stdout, _, success) = run_ledger(&config_path, &["plan", "parse", RELEASE]);
    assert!(success);
    let job = job_name(&stdout);

    let (_, stderr, success) = run_ledger(&config_path, &["submit", &job]);
    assert!(!success);
    assert!(stderr.contains("[runner]"), "{}", stderr);
}

#[test]
fn test_unpublished_release_cannot_be_planned() {
    let (_tmp, config_path) = setup_test_env(false);

    let (_, stderr, success) = run_ledger(&config_path, &["plan", "parse", "CC-MAIN-2099-01"]);
    assert!(!success);
    assert!(stderr.contains("no segments"), "{}", stderr);
}

#[test]
fn test_show_unknown_job_fails() {
    let (_tmp, config_path) = setup_test_env(false);

    let (_, stderr, success) = run_ledger(&config_path, &["show", "1234"]);
    assert!(!success);
    assert!(stderr.contains("job not found: 1234"), "{}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ledger(&tmp.path().join("nope.toml"), &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}
