use hogwatch::collector::{ProcessCollector, ProcessInfo};
use hogwatch::executor::{KillError, KillOutcome, ProcessKiller};
use hogwatch::resolver::{KillResolver, KillTarget, Prompt, TargetParseError};
use std::sync::{Arc, Mutex};

struct StaticCollector {
    processes: Vec<ProcessInfo>,
    port_owner: Option<ProcessInfo>,
}

impl StaticCollector {
    fn with_processes(processes: Vec<ProcessInfo>) -> Self {
        Self {
            processes,
            port_owner: None,
        }
    }

    fn with_port_owner(owner: ProcessInfo) -> Self {
        Self {
            processes: Vec::new(),
            port_owner: Some(owner),
        }
    }

    fn empty() -> Self {
        Self {
            processes: Vec::new(),
            port_owner: None,
        }
    }
}

impl ProcessCollector for StaticCollector {
    fn list_processes(&self) -> Vec<ProcessInfo> {
        self.processes.clone()
    }

    fn get_process(&self, pid: u32) -> Option<ProcessInfo> {
        self.processes.iter().find(|p| p.pid == pid).cloned()
    }

    fn find_by_port(&self, _port: u16) -> Option<ProcessInfo> {
        self.port_owner.clone()
    }
}

#[derive(Clone)]
struct RecordingKiller {
    kills: Arc<Mutex<Vec<u32>>>,
    already_gone: bool,
}

impl RecordingKiller {
    fn new() -> (Self, Arc<Mutex<Vec<u32>>>) {
        let kills = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                kills: Arc::clone(&kills),
                already_gone: false,
            },
            kills,
        )
    }

    fn gone() -> (Self, Arc<Mutex<Vec<u32>>>) {
        let kills = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                kills: Arc::clone(&kills),
                already_gone: true,
            },
            kills,
        )
    }
}

impl ProcessKiller for RecordingKiller {
    fn terminate(&self, pid: u32) -> Result<KillOutcome, KillError> {
        self.kills.lock().unwrap().push(pid);
        if self.already_gone {
            Ok(KillOutcome::AlreadyGone)
        } else {
            Ok(KillOutcome::Terminated)
        }
    }
}

struct ScriptedPrompt {
    answer: bool,
    questions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompt {
    fn new(answer: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
        let questions = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                answer,
                questions: Arc::clone(&questions),
            },
            questions,
        )
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, question: &str, _default_yes: bool) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer
    }
}

fn proc(pid: u32, name: &str, cmdline: &str) -> ProcessInfo {
    ProcessInfo {
        pid,
        name: name.to_string(),
        cmdline: cmdline.to_string(),
        cpu_percent: 1.0,
        start_time: 1_000,
    }
}

fn chrome_renderers() -> Vec<ProcessInfo> {
    vec![
        proc(100, "chrome", "chrome --type=renderer --id=1"),
        proc(101, "chrome", "chrome --type=renderer --id=2"),
        proc(102, "chrome", "chrome --type=renderer --id=3"),
        proc(103, "chrome", "chrome --type=gpu-process"),
        proc(104, "bash", "bash"),
    ]
}

#[test]
fn test_parse_targets() {
    assert_eq!(KillTarget::parse("1680").unwrap(), KillTarget::Pid(1680));
    assert_eq!(KillTarget::parse(":3000").unwrap(), KillTarget::Port(3000));
    assert_eq!(
        KillTarget::parse("chrome%renderer").unwrap(),
        KillTarget::Name("chrome%renderer".to_string())
    );
    assert!(matches!(
        KillTarget::parse(":not-a-port"),
        Err(TargetParseError::InvalidPort(_))
    ));
    assert!(matches!(KillTarget::parse("  "), Err(TargetParseError::Empty)));
}

#[test]
fn test_port_with_no_owner_resolves_empty() {
    let (killer, _) = RecordingKiller::new();
    let (prompt, _) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(StaticCollector::empty(), killer, prompt, false);

    assert!(resolver.resolve(&KillTarget::Port(3000)).is_empty());
}

#[test]
fn test_name_resolution_matches_cmdline_substring() {
    let (killer, _) = RecordingKiller::new();
    let (prompt, _) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(chrome_renderers()),
        killer,
        prompt,
        false,
    );

    let candidates = resolver.resolve(&KillTarget::Name("chrome%renderer".to_string()));
    let pids: Vec<u32> = candidates.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![100, 101, 102]);
}

#[test]
fn test_name_resolution_excludes_own_process() {
    let own = std::process::id();
    let mut processes = vec![proc(200, "chrome", "chrome")];
    processes.push(proc(own, "chrome", "chrome"));
    let (killer, _) = RecordingKiller::new();
    let (prompt, _) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(processes),
        killer,
        prompt,
        false,
    );

    let candidates = resolver.resolve(&KillTarget::Name("chrome".to_string()));
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].pid, 200);
}

#[tokio::test]
async fn test_nothing_found_kills_nothing() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, questions) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(StaticCollector::empty(), killer, prompt, false);

    resolver.execute(&KillTarget::Name("ghost".to_string())).await;

    assert!(kills.lock().unwrap().is_empty());
    assert!(questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_plural_match_requires_confirmation() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, questions) = ScriptedPrompt::new(false);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(chrome_renderers()),
        killer,
        prompt,
        false,
    );

    resolver
        .execute(&KillTarget::Name("chrome%renderer".to_string()))
        .await;

    assert!(kills.lock().unwrap().is_empty(), "decline must abort");
    assert_eq!(questions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_plural_match_accept_kills_all() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, _) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(chrome_renderers()),
        killer,
        prompt,
        false,
    );

    resolver
        .execute(&KillTarget::Name("chrome%renderer".to_string()))
        .await;

    let mut killed = kills.lock().unwrap().clone();
    killed.sort_unstable();
    assert_eq!(killed, vec![100, 101, 102]);
}

#[tokio::test]
async fn test_yes_flag_skips_all_questions() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, questions) = ScriptedPrompt::new(false);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(chrome_renderers()),
        killer,
        prompt,
        true,
    );

    resolver
        .execute(&KillTarget::Name("chrome%renderer".to_string()))
        .await;

    assert_eq!(kills.lock().unwrap().len(), 3);
    assert!(questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_port_owner_confirmed_before_kill() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, questions) = ScriptedPrompt::new(false);
    let resolver = KillResolver::new(
        StaticCollector::with_port_owner(proc(300, "node", "node server.js")),
        killer,
        prompt,
        false,
    );

    resolver.execute(&KillTarget::Port(3000)).await;

    assert!(kills.lock().unwrap().is_empty());
    assert_eq!(questions.lock().unwrap().len(), 1);

    let (killer, kills) = RecordingKiller::new();
    let (prompt, _) = ScriptedPrompt::new(true);
    let resolver = KillResolver::new(
        StaticCollector::with_port_owner(proc(300, "node", "node server.js")),
        killer,
        prompt,
        false,
    );

    resolver.execute(&KillTarget::Port(3000)).await;

    assert_eq!(*kills.lock().unwrap(), vec![300]);
}

#[tokio::test]
async fn test_single_name_match_kills_without_asking() {
    let (killer, kills) = RecordingKiller::new();
    let (prompt, questions) = ScriptedPrompt::new(false);
    let resolver = KillResolver::new(
        StaticCollector::with_processes(vec![proc(400, "zombie", "zombie --run")]),
        killer,
        prompt,
        false,
    );

    resolver.execute(&KillTarget::Name("zombie".to_string())).await;

    assert_eq!(*kills.lock().unwrap(), vec![400]);
    assert!(questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pid_target_tolerates_missing_process() {
    let (killer, kills) = RecordingKiller::gone();
    let (prompt, questions) = ScriptedPrompt::new(false);
    let resolver = KillResolver::new(StaticCollector::empty(), killer, prompt, false);

    let candidates = resolver.resolve(&KillTarget::Pid(4242));
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].pid, 4242);

    resolver.execute(&KillTarget::Pid(4242)).await;
    assert_eq!(*kills.lock().unwrap(), vec![4242]);
    assert!(questions.lock().unwrap().is_empty());
}
