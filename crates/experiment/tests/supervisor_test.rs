//! End-to-end supervisor runs over a temporary experiments directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rulehunter_core::{Config, QuitSignal};
use rulehunter_experiment::{ExperimentRecord, State, Supervisor};
use tempfile::TempDir;

const TITLE: &str = "What is most likely to indicate success";
const TRAIN_REPORT: &str = "train_what-is-most-likely-to-indicate-success.json";

struct Fixture {
    _root: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = Config {
            experiments_dir: root.path().join("experiments"),
            build_dir: root.path().join("build"),
            max_num_processes: 2,
            poll_interval_ms: 50,
            ..Config::default()
        };
        fs::create_dir_all(&config.experiments_dir).unwrap();
        Self {
            _root: root,
            config,
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.config.experiments_dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// `success` holds exactly when `x > 60`.
    fn write_csv(&self, name: &str, rows: u32) {
        let mut csv = String::from("x,y,success\n");
        for x in 1..=rows {
            csv.push_str(&format!("{},{},{}\n", x, (x * 7) % 13, x > 60));
        }
        self.write(name, &csv);
    }

    fn supervisor(&self, quit: &QuitSignal) -> Supervisor {
        Supervisor::new(self.config.clone(), quit.clone()).unwrap()
    }

    fn report(&self, name: &str) -> PathBuf {
        self.config.reports_dir().join(name)
    }

    fn tmp_is_empty(&self) -> bool {
        fs::read_dir(self.config.tmp_dir()).unwrap().count() == 0
    }
}

fn debt_json(when: &str, goal: &str) -> String {
    format!(
        r#"{{
  "title": "{TITLE}",
  "tags": ["debt"],
  "train": {{
    "dataset": {{"csv": {{"filename": "debt.csv", "hasHeader": true}}}},
    "when": "{when}",
    "ruleGeneration": {{"fields": ["x", "y"], "combinationLength": 1}}
  }},
  "aggregators": [{{"name": "helpedMcc", "function": "mcc", "arg": "success"}}],
  "goals": ["{goal}"],
  "sortOrder": [{{"aggregator": "helpedMcc", "direction": "descending"}}]
}}"#
    )
}

fn record(sup: &Supervisor, file: &str) -> ExperimentRecord {
    sup.monitor()
        .get_experiments()
        .into_iter()
        .find(|e| e.filename == file)
        .unwrap_or_else(|| panic!("no progress record for {}", file))
}

fn persisted(path: &Path) -> Vec<String> {
    let json: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    json["experiments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["filename"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn successful_discovery_writes_report() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write(
        "debt.json",
        &debt_json("!hasRunToday || sinceLastRunHours > 2", "helpedMcc > 0"),
    );
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();

    let rec = record(&sup, "debt.json");
    assert_eq!(rec.status.state, State::Success);
    assert_eq!(rec.title, TITLE);
    assert_eq!(rec.tags, vec!["debt"]);
    assert!(f.report(TRAIN_REPORT).exists());
    assert_eq!(
        persisted(&f.config.progress_dir().join("progress.json")),
        vec!["debt.json"]
    );
    assert!(f.tmp_is_empty());

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(f.report(TRAIN_REPORT)).unwrap()).unwrap();
    let assessments = report["assessments"].as_array().unwrap();
    assert_eq!(assessments.last().unwrap()["rule"], "true()");
    assert_eq!(assessments[0]["goals"][0]["passed"], true);
}

#[tokio::test]
async fn broken_yaml_is_recorded_and_others_still_run() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write("0debt_broken.yaml", "title: broken\ntags: [debt]\ntrain: dataset: x\n");
    f.write("debt.json", &debt_json("", "helpedMcc > 0"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();

    let broken = record(&sup, "0debt_broken.yaml");
    assert_eq!(broken.status.state, State::Error);
    assert_eq!(
        broken.status.msg,
        "Error loading experiment: yaml: line 3: mapping values are not allowed in this context"
    );
    assert_eq!(record(&sup, "debt.json").status.state, State::Success);
    let reports: Vec<_> = fs::read_dir(f.config.reports_dir()).unwrap().collect();
    assert_eq!(reports.len(), 1);
}

#[tokio::test]
async fn missing_dataset_is_retried_once_it_appears() {
    let f = Fixture::new();
    f.write("debt.json", &debt_json("", "helpedMcc > 0"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();
    let failed = record(&sup, "debt.json").status;
    assert_eq!(failed.state, State::Error);
    assert!(
        failed.msg.starts_with("Error loading experiment: "),
        "{}",
        failed.msg
    );
    assert!(!f.report(TRAIN_REPORT).exists());

    // Same failure again isn't re-recorded.
    sup.run_once().await.unwrap();
    assert_eq!(record(&sup, "debt.json").status.stamp, failed.stamp);

    f.write_csv("debt.csv", 100);
    sup.run_once().await.unwrap();

    assert_eq!(record(&sup, "debt.json").status.state, State::Success);
    assert!(f.report(TRAIN_REPORT).exists());
}

#[tokio::test]
async fn invalid_when_is_an_error() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write("debt_invalid_when.json", &debt_json("never", "helpedMcc > 0"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();

    let rec = record(&sup, "debt_invalid_when.json");
    assert_eq!(rec.status.state, State::Error);
    assert_eq!(
        rec.status.msg,
        "invalid expression: never (variable doesn't exist: never)"
    );
    assert!(!f.report(TRAIN_REPORT).exists());
}

#[tokio::test]
async fn divide_by_zero_goal_is_an_error() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write("debt.json", &debt_json("", "helpedMcc / 0 > 1"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();

    let rec = record(&sup, "debt.json");
    assert_eq!(rec.status.state, State::Error);
    assert!(
        rec.status
            .msg
            .starts_with("Couldn't assess rules: invalid expression: "),
        "{}",
        rec.status.msg
    );
    assert!(rec.status.msg.ends_with("(divide by zero)"));
    assert!(!f.report(TRAIN_REPORT).exists());
    assert!(f.tmp_is_empty());
}

#[tokio::test]
async fn quit_mid_run_stops_serve_without_a_report() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 30_000);
    f.write("debt.json", &debt_json("", "helpedMcc > 0"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);
    let mut updates = sup.monitor().subscribe();

    let stop = async {
        while let Ok(update) = updates.recv().await {
            if update.experiment.status.state == State::Processing {
                break;
            }
        }
        quit.raise();
    };
    let (served, _) = tokio::time::timeout(Duration::from_secs(60), async {
        tokio::join!(sup.serve(), stop)
    })
    .await
    .expect("serve didn't return after quit");
    served.unwrap();

    assert!(!f.report(TRAIN_REPORT).exists());
    assert_ne!(record(&sup, "debt.json").status.state, State::Success);
    assert!(f.tmp_is_empty());
}

#[tokio::test]
async fn when_has_run_skips_a_file_modified_since_last_success() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write("debt_when_hasrun.json", &debt_json("hasRun", "helpedMcc > 0"));
    let progress_dir = f.config.progress_dir();
    fs::create_dir_all(&progress_dir).unwrap();
    fs::write(
        progress_dir.join("progress.json"),
        format!(
            r#"{{"experiments": [{{"filename": "debt_when_hasrun.json", "title": "{TITLE}", "tags": [], "category": "",
                "status": {{"stamp": "2000-01-01T00:00:00Z", "msg": "Finished processing successfully", "state": "success"}}}}]}}"#
        ),
    )
    .unwrap();
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();

    let rec = record(&sup, "debt_when_hasrun.json");
    assert_eq!(rec.status.state, State::Success);
    assert_eq!(rec.status.stamp.to_rfc3339(), "2000-01-01T00:00:00+00:00");
    assert!(!f.report(TRAIN_REPORT).exists());
}

#[tokio::test]
async fn default_when_does_not_rerun() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    f.write("debt.json", &debt_json("", "helpedMcc > 0"));
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_once().await.unwrap();
    let first = record(&sup, "debt.json").status.stamp;
    let written = fs::metadata(f.report(TRAIN_REPORT))
        .unwrap()
        .modified()
        .unwrap();

    sup.run_once().await.unwrap();
    assert_eq!(record(&sup, "debt.json").status.stamp, first);
    assert_eq!(
        fs::metadata(f.report(TRAIN_REPORT))
            .unwrap()
            .modified()
            .unwrap(),
        written
    );
}

#[tokio::test]
async fn run_file_processes_a_single_descriptor() {
    let f = Fixture::new();
    f.write_csv("debt.csv", 100);
    let path = f.write("debt.json", &debt_json("", "helpedMcc > 0"));
    f.write("other.yaml", "title: other\n");
    let quit = QuitSignal::new();
    let sup = f.supervisor(&quit);

    sup.run_file(&path).await.unwrap();

    assert_eq!(record(&sup, "debt.json").status.state, State::Success);
    assert!(sup
        .monitor()
        .get_experiments()
        .iter()
        .all(|e| e.filename != "other.yaml"));
}
