//! Reparse task
//!
//!     One task per document coalesces parse requests. At most one parse runs at a time, and
//!     every caller waiting on it receives a tree built from the most recent text submitted,
//!     even when that text arrived after the parse started.
//!
//!     States:
//!
//!         Idle          nothing running; the last finished tree (if any) is cached
//!         Running       a parse of the current text is in flight
//!         StalePending  a parse is in flight but newer text has been submitted since
//!
//!     A driver owns the in-flight computation. It yields once before the first parse so that
//!     bursts of edits land before any work starts, runs the parser on the blocking pool, and
//!     loops while the text it parsed is no longer the current one. Its outcome is published
//!     through a watch channel that every waiter subscribed to.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace, warn};
use wikitext_parser::{ParseError, Parser, SyntaxTree};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("parser panicked: {0}")]
    Panicked(String),

    #[error("parse task is closed")]
    Closed,

    #[error("parse was cancelled before it finished")]
    Cancelled,
}

pub type TaskResult = Result<Arc<SyntaxTree>, TaskError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Idle,
    Running,
    StalePending,
}

struct TaskState {
    /// Last submitted text.
    text: Arc<str>,
    /// Text the in-flight parse is working on.
    in_flight: Option<Arc<str>>,
    running: Option<watch::Receiver<Option<TaskResult>>>,
    done: Option<(Arc<str>, Arc<SyntaxTree>)>,
    closed: bool,
}

pub struct ReparseTask {
    parser: Arc<dyn Parser>,
    state: Mutex<TaskState>,
}

impl ReparseTask {
    pub fn new(parser: Arc<dyn Parser>) -> Arc<Self> {
        Arc::new(Self {
            parser,
            state: Mutex::new(TaskState {
                text: Arc::from(""),
                in_flight: None,
                running: None,
                done: None,
                closed: false,
            }),
        })
    }

    /// Submit `text` and wait for the tree of the latest submitted text.
    pub async fn queue(self: &Arc<Self>, text: &str) -> TaskResult {
        let mut outcome = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(TaskError::Closed);
            }
            if state.running.is_none() {
                if let Some((done_text, tree)) = &state.done {
                    if **done_text == *text {
                        trace!("reusing cached tree");
                        return Ok(Arc::clone(tree));
                    }
                }
            }
            if *state.text != *text {
                state.text = Arc::from(text);
            }
            match &state.running {
                Some(running) => running.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.running = Some(rx.clone());
                    tokio::spawn(Arc::clone(self).drive(tx));
                    rx
                }
            }
        };
        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TaskError::Cancelled)?;
        result.clone().unwrap_or(Err(TaskError::Cancelled))
    }

    pub async fn phase(&self) -> TaskPhase {
        let state = self.state.lock().await;
        match (&state.running, &state.in_flight) {
            (None, _) => TaskPhase::Idle,
            (Some(_), Some(parsing)) if **parsing != *state.text => TaskPhase::StalePending,
            (Some(_), _) => TaskPhase::Running,
        }
    }

    /// Refuse further submissions. A parse in flight still completes and is published but
    /// does not restart for newer text.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    async fn drive(self: Arc<Self>, tx: watch::Sender<Option<TaskResult>>) {
        tokio::task::yield_now().await;
        let outcome = loop {
            let text = {
                let mut state = self.state.lock().await;
                let text = Arc::clone(&state.text);
                state.in_flight = Some(Arc::clone(&text));
                text
            };
            let parser = Arc::clone(&self.parser);
            let input = Arc::clone(&text);
            debug!(len = text.len(), "parsing");
            let parsed = tokio::task::spawn_blocking(move || parser.parse(&input)).await;

            let mut state = self.state.lock().await;
            state.in_flight = None;
            let tree = match parsed {
                Ok(Ok(tree)) => Arc::new(tree),
                Ok(Err(err)) => {
                    warn!(error = %err, "parse failed");
                    state.running = None;
                    break Err(TaskError::Parse(err));
                }
                Err(join) => {
                    warn!(error = %join, "parser panicked");
                    state.running = None;
                    break Err(TaskError::Panicked(join.to_string()));
                }
            };
            if state.closed || *state.text == *text {
                state.done = Some((text, Arc::clone(&tree)));
                state.running = None;
                break Ok(tree);
            }
            debug!("text changed during parse, reparsing");
        };
        tx.send_replace(Some(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Mutex as StdMutex;
    use wikitext_parser::{ParserConfig, WikitextParser};

    /// Records every text it parses. With a gate, the first parse blocks until it is released.
    #[derive(Default)]
    struct CountingParser {
        inner: WikitextParser,
        calls: AtomicUsize,
        seen: StdMutex<Vec<String>>,
        fail_on: Option<&'static str>,
        gate: StdMutex<Option<mpsc::Receiver<()>>>,
    }

    impl Parser for CountingParser {
        fn parse(&self, text: &str) -> Result<SyntaxTree, ParseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.recv().unwrap();
            }
            if Some(text) == self.fail_on {
                return Err(ParseError::TooLarge { len: 0, limit: 0 });
            }
            if text == "panic" {
                panic!("boom");
            }
            self.inner.parse(text)
        }

        fn config(&self) -> &ParserConfig {
            self.inner.config()
        }
    }

    fn task(parser: &Arc<CountingParser>) -> Arc<ReparseTask> {
        let parser: Arc<dyn Parser> = parser.clone();
        ReparseTask::new(parser)
    }

    #[tokio::test]
    async fn cached_tree_is_reused() {
        let parser = Arc::new(CountingParser::default());
        let task = task(&parser);
        let first = task.queue("{{a}}").await.unwrap();
        let second = task.queue("{{a}}").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
        assert_eq!(task.phase().await, TaskPhase::Idle);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_parse_of_the_latest_text() {
        let parser = Arc::new(CountingParser::default());
        let task = task(&parser);
        let (a, b, c) = tokio::join!(task.queue("a"), task.queue("ab"), task.queue("abc"));
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.text(), "abc");
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_results_are_reparsed() {
        let (release, gate) = mpsc::channel();
        let parser = Arc::new(CountingParser {
            gate: StdMutex::new(Some(gate)),
            ..CountingParser::default()
        });
        let task = task(&parser);
        let queue = |text: &'static str| {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.queue(text).await })
        };
        let first = queue("old");
        // the parse of "old" is now blocked on the gate
        while parser.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(task.phase().await, TaskPhase::Running);
        let second = queue("new");
        while task.phase().await != TaskPhase::StalePending {
            tokio::task::yield_now().await;
        }
        release.send(()).unwrap();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.text(), "new");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*parser.seen.lock().unwrap(), vec!["old", "new"]);
        assert_eq!(task.phase().await, TaskPhase::Idle);
    }

    #[tokio::test]
    async fn failures_reach_every_waiter_and_keep_the_cache() {
        let parser = Arc::new(CountingParser {
            fail_on: Some("bad"),
            ..CountingParser::default()
        });
        let task = task(&parser);
        let good = task.queue("good").await.unwrap();
        let (a, b) = tokio::join!(task.queue("bad"), task.queue("bad"));
        assert!(matches!(a, Err(TaskError::Parse(_))));
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        let again = task.queue("good").await.unwrap();
        assert!(Arc::ptr_eq(&good, &again));
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let parser = Arc::new(CountingParser::default());
        let task = task(&parser);
        assert!(matches!(
            task.queue("panic").await,
            Err(TaskError::Panicked(_))
        ));
        assert_eq!(task.phase().await, TaskPhase::Idle);
        assert!(task.queue("ok").await.is_ok());
    }

    #[tokio::test]
    async fn closed_tasks_refuse_work() {
        let parser = Arc::new(CountingParser::default());
        let task = task(&parser);
        task.queue("a").await.unwrap();
        task.close().await;
        assert!(task.is_closed().await);
        assert_eq!(task.queue("a").await.unwrap_err(), TaskError::Closed);
    }
}
