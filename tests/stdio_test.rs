use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value as Json};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use swfdap_core::sim::{ScriptedHalt, SimContext, SimFile, SimFrame};
use swfdap_core::{Location, NativeEvent, Scenario, SourceFile, SuspendReason, Value, Variable};
use swfdap_protocol::{encode_message, read_message};

const MAIN_AS: &str = "/work/src/Main.as";
const MAIN_SWF: &str = "/work/bin/Main.swf";

// ── Client driving the binary over stdio ────────────────────────

struct Client {
    _child: Child,
    _home: tempfile::TempDir,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    seq: i64,
}

impl Client {
    fn spawn(scenario: &Scenario) -> Self {
        let home = tempfile::tempdir().unwrap();
        let scenario_path = home.path().join("scenario.json");
        std::fs::write(&scenario_path, serde_json::to_string(scenario).unwrap()).unwrap();

        let mut child = Command::new(env!("CARGO_BIN_EXE_swfdap"))
            .arg("--scenario")
            .arg(&scenario_path)
            .arg("--config-dir")
            .arg(home.path().join("config"))
            .env("HOME", home.path())
            .env_remove("RUST_LOG")
            .current_dir(home.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn swfdap");

        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            _child: child,
            _home: home,
            stdin,
            stdout,
            seq: 0,
        }
    }

    async fn send(&mut self, command: &str, arguments: Json) -> i64 {
        self.seq += 1;
        let message = json!({
            "seq": self.seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        });
        self.stdin.write_all(&encode_message(&message)).await.unwrap();
        self.stdin.flush().await.unwrap();
        self.seq
    }

    /// Reads messages until one matches, collecting everything seen.
    async fn until(&mut self, seen: &mut Vec<Json>, pred: impl Fn(&Json) -> bool) -> Json {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let message = read_message(&mut self.stdout)
                    .await
                    .unwrap()
                    .expect("adapter closed stdout");
                seen.push(message.clone());
                if pred(&message) {
                    return message;
                }
            }
        })
        .await
        .expect("timed out waiting for message")
    }

    async fn request(&mut self, seen: &mut Vec<Json>, command: &str, arguments: Json) -> Json {
        let seq = self.send(command, arguments).await;
        self.until(seen, |m| m["type"] == "response" && m["request_seq"] == seq)
            .await
    }

    async fn event(&mut self, seen: &mut Vec<Json>, name: &str) -> Json {
        self.until(seen, |m| m["type"] == "event" && m["event"] == name)
            .await
    }
}

fn main_as() -> SourceFile {
    SourceFile {
        id: 1,
        name: "Main.as".into(),
        full_path: MAIN_AS.into(),
    }
}

fn scenario() -> Scenario {
    let mut frame = SimFrame::new(
        "Main/update()",
        Some(Location {
            context_id: 0,
            file_id: 1,
            line: 10,
            file: Some(main_as()),
        }),
    );
    frame.locals = vec![Variable::new("count", Value::number(3.0))];

    let mut contexts = BTreeMap::new();
    contexts.insert(
        0,
        SimContext {
            suspended: Some(SuspendReason::ScriptLoaded),
            files: vec![SimFile::new(1, MAIN_AS)],
            frames: Vec::new(),
        },
    );
    Scenario {
        contexts,
        events: vec![NativeEvent::ScriptLoaded {
            path: MAIN_SWF.into(),
            index: 0,
        }],
        halts: vec![ScriptedHalt {
            context_id: 0,
            reason: SuspendReason::Breakpoint,
            events: vec![NativeEvent::Break {
                context_id: 0,
                file_id: 1,
                line: 10,
            }],
            frames: Some(vec![frame]),
            files: Vec::new(),
        }],
        ..Scenario::default()
    }
}

// ── End-to-end session ──────────────────────────────────────────

#[tokio::test]
async fn breakpoint_session_over_stdio() {
    let mut client = Client::spawn(&scenario());
    let mut seen = Vec::new();

    let init = client
        .request(&mut seen, "initialize", json!({"adapterID": "swf"}))
        .await;
    assert_eq!(init["success"], true);
    assert_eq!(init["body"]["supportsConfigurationDoneRequest"], true);

    let launch = client
        .request(&mut seen, "launch", json!({"program": MAIN_SWF}))
        .await;
    assert_eq!(launch["success"], true, "launch failed: {launch}");
    client.event(&mut seen, "initialized").await;

    let set = client
        .request(
            &mut seen,
            "setBreakpoints",
            json!({"source": {"path": MAIN_AS}, "breakpoints": [{"line": 10}]}),
        )
        .await;
    assert_eq!(set["body"]["breakpoints"][0]["verified"], true);

    let done = client.request(&mut seen, "configurationDone", json!({})).await;
    assert_eq!(done["success"], true);

    let stopped = client.event(&mut seen, "stopped").await;
    assert_eq!(stopped["body"]["reason"], "breakpoint");
    assert_eq!(stopped["body"]["threadId"], 0);

    let trace = client
        .request(&mut seen, "stackTrace", json!({"threadId": 0}))
        .await;
    let top = &trace["body"]["stackFrames"][0];
    assert_eq!(top["line"], 10);
    assert_eq!(top["source"]["path"], MAIN_AS);

    let disconnect = client.request(&mut seen, "disconnect", json!({})).await;
    assert_eq!(disconnect["success"], true);

    let seqs: Vec<i64> = seen.iter().filter_map(|m| m["seq"].as_i64()).collect();
    let expected: Vec<i64> = (1..=seqs.len() as i64).collect();
    assert_eq!(seqs, expected, "outbound seq must start at 1 and increase by one");
}

#[tokio::test]
async fn unknown_command_over_stdio() {
    let mut client = Client::spawn(&Scenario::default());
    let mut seen = Vec::new();
    let response = client.request(&mut seen, "restartFrame", json!({})).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["body"]["error"]["id"], 1014);
}
