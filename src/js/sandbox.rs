// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Script side of the sandbox
//!
//! Every execution gets a fresh boa `Context`, normally inside its own
//! sandbox process (see `process`). The only native function the script can
//! reach is `post`, which forwards a JSON message to the host; host replies
//! arrive through an inbox the interpreter blocks on between promise jobs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boa_engine::context::ContextBuilder;
use boa_engine::job::{FutureJob, JobQueue, NativeJob};
use boa_engine::{
    Context, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction,
    Source,
};
use boa_gc::{Finalize, Trace};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::message::{HostMessage, SandboxMessage};

const PRELUDE: &str = include_str!("prelude.js");

/// Interpreter limits applied to every context
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct SandboxLimits {
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

/// Everything the interpreter needs, already serialized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SandboxJob {
    pub script: String,
    pub context_json: String,
    pub environment_json: String,
    pub limits: SandboxLimits,
}

/// Run one script to its end on the calling thread.
///
/// Returns after a terminal message was posted, once `abort` is set, or when
/// the inbox sender is dropped. Must not be called from inside a tokio
/// runtime.
pub(crate) fn execute(
    job: SandboxJob,
    outbox: UnboundedSender<SandboxMessage>,
    inbox: UnboundedReceiver<HostMessage>,
    abort: Arc<AtomicBool>,
) {
    if let Err(error) = run(job, outbox.clone(), inbox, abort) {
        let _ = outbox.send(SandboxMessage::ExecutionError { error });
    }
    debug!("Script sandbox released");
}

/// Start an in-process sandbox thread. Tests only: the thread cannot be
/// stopped while a script spins without yielding.
#[cfg(test)]
pub(crate) fn spawn_thread(
    job: SandboxJob,
    outbox: UnboundedSender<SandboxMessage>,
    inbox: UnboundedReceiver<HostMessage>,
    abort: Arc<AtomicBool>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("script-sandbox".to_string())
        .spawn(move || execute(job, outbox, inbox, abort))
        .map(|_| ())
}

/// Capture handed to the native `post` function
#[derive(Trace, Finalize)]
struct Bridge {
    #[unsafe_ignore_trace]
    outbox: UnboundedSender<SandboxMessage>,
    #[unsafe_ignore_trace]
    abort: Arc<AtomicBool>,
    #[unsafe_ignore_trace]
    finished: Rc<Cell<bool>>,
}

fn post_message(
    _this: &JsValue,
    args: &[JsValue],
    bridge: &Bridge,
    context: &mut Context,
) -> JsResult<JsValue> {
    if bridge.abort.load(Ordering::SeqCst) {
        return Err(JsNativeError::error()
            .with_message("script execution was aborted")
            .into());
    }

    let json = args
        .first()
        .cloned()
        .unwrap_or_default()
        .to_string(context)?
        .to_std_string_escaped();
    let message: SandboxMessage = serde_json::from_str(&json).map_err(|e| {
        JsNativeError::typ().with_message(format!("malformed sandbox message: {}", e))
    })?;

    trace!(?message, "Script posted message");
    let terminal = message.is_terminal();
    if bridge.outbox.send(message).is_err() {
        bridge.abort.store(true, Ordering::SeqCst);
        return Err(JsNativeError::error()
            .with_message("script host is gone")
            .into());
    }
    if terminal {
        bridge.finished.set(true);
    }

    Ok(JsValue::undefined())
}

/// Promise job queue that stops draining once the run is aborted
struct ScriptJobQueue {
    jobs: RefCell<VecDeque<NativeJob>>,
    abort: Arc<AtomicBool>,
}

impl ScriptJobQueue {
    fn new(abort: Arc<AtomicBool>) -> Self {
        Self {
            jobs: RefCell::new(VecDeque::new()),
            abort,
        }
    }
}

impl JobQueue for ScriptJobQueue {
    fn enqueue_promise_job(&self, job: NativeJob, _context: &mut Context) {
        self.jobs.borrow_mut().push_back(job);
    }

    fn enqueue_future_job(&self, future: FutureJob, context: &mut Context) {
        let job = futures::executor::block_on(future);
        self.enqueue_promise_job(job, context);
    }

    fn run_jobs(&self, context: &mut Context) {
        loop {
            if self.abort.load(Ordering::SeqCst) {
                self.jobs.borrow_mut().clear();
                return;
            }
            let Some(job) = self.jobs.borrow_mut().pop_front() else {
                return;
            };
            if let Err(e) = job.call(context) {
                debug!(error = %e, "Promise job failed");
            }
        }
    }
}

fn js_text(text: &str) -> JsValue {
    JsValue::from(JsString::from(text))
}

fn callable(hooks: &JsObject, name: &str, context: &mut Context) -> Result<JsObject, String> {
    hooks
        .get(JsString::from(name), context)
        .map_err(|e| e.to_string())?
        .as_callable()
        .cloned()
        .ok_or_else(|| format!("prelude did not provide '{}'", name))
}

fn run(
    job: SandboxJob,
    outbox: UnboundedSender<SandboxMessage>,
    mut inbox: UnboundedReceiver<HostMessage>,
    abort: Arc<AtomicBool>,
) -> Result<(), String> {
    let queue = Rc::new(ScriptJobQueue::new(abort.clone()));
    let mut context = ContextBuilder::new()
        .job_queue(queue)
        .build()
        .map_err(|e| format!("failed to create script context: {}", e))?;

    let limits = context.runtime_limits_mut();
    limits.set_loop_iteration_limit(job.limits.loop_iteration_limit);
    limits.set_recursion_limit(job.limits.recursion_limit);

    let finished = Rc::new(Cell::new(false));
    let post = NativeFunction::from_copy_closure_with_captures(
        post_message,
        Bridge {
            outbox,
            abort: abort.clone(),
            finished: finished.clone(),
        },
    )
    .to_js_function(context.realm());

    let prelude = context
        .eval(Source::from_bytes(PRELUDE))
        .map_err(|e| format!("failed to load prelude: {}", e))?;
    let prelude = prelude
        .as_callable()
        .cloned()
        .ok_or_else(|| "prelude is not a function".to_string())?;

    let hooks = prelude
        .call(
            &JsValue::undefined(),
            &[
                JsValue::from(post),
                js_text(&job.context_json),
                js_text(&job.environment_json),
            ],
            &mut context,
        )
        .map_err(|e| e.to_string())?;
    let hooks = hooks
        .as_object()
        .cloned()
        .ok_or_else(|| "prelude returned no hooks".to_string())?;
    let receive = callable(&hooks, "receive", &mut context)?;
    let settle = callable(&hooks, "settle", &mut context)?;

    let wrapped = format!("(async () => {{\n{}\n}})()", job.script);
    let completion = context
        .eval(Source::from_bytes(&wrapped))
        .map_err(|e| e.to_string())?;
    settle
        .call(&JsValue::undefined(), &[completion], &mut context)
        .map_err(|e| e.to_string())?;

    loop {
        context.run_jobs();
        if finished.get() || abort.load(Ordering::SeqCst) {
            break;
        }

        let Some(reply) = inbox.blocking_recv() else {
            break;
        };
        let json = serde_json::to_string(&reply).map_err(|e| e.to_string())?;
        if let Err(e) = receive.call(&JsValue::undefined(), &[js_text(&json)], &mut context) {
            debug!(error = %e, "Delivering host reply failed");
        }
    }

    Ok(())
}
