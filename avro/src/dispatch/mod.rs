// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Running a handler for every decoded record.
//!
//! With one thread the handler runs on the decoding thread and sees the
//! borrowed value. With more, each record is copied out with
//! [`Value::into_owned`] and sent through a bounded queue to a pool of
//! workers; the decoding thread blocks while the queue is full.
//!
//! Every handler invocation renders its whole output first and writes it to
//! the [`OutputSink`] in one call, so lines from different workers never
//! interleave. [`Dispatcher::barrier`] waits for the pool to drain, which
//! [`process_file`] does at the end of every file.

#[cfg(feature = "lua")]
pub mod lua;
pub mod script;

pub use script::{
    NoScriptEngine, RECORD_GLOBAL, ScriptCallback, ScriptEngine, ScriptHost, ScriptSource,
    default_script_engine,
};

use crate::{
    AvroResult, Error,
    error::Details,
    path::{FieldPath, resolve},
    printer::render,
    reader::ContainerReader,
    types::Value,
};
use log::{debug, info};
use std::{
    io::{self, Write},
    path::Path,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread::{self, JoinHandle},
};
use strum_macros::{EnumString, IntoStaticStr};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Separator between the fields printed by [`Handler::FieldPrint`].
const FIELD_SEPARATOR: &str = "\t";

/// Handler names as given on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum HandlerKind {
    Cat,
    Json,
    FieldPrint,
    ScriptInline,
    ScriptFile,
}

/// What to do with each record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handler {
    /// Print the whole record as a brace block.
    Cat,
    /// Print the record as one line of JSON.
    Json,
    /// Print the listed fields, tab separated.
    FieldPrint(Vec<FieldPath>),
    Script(ScriptSource),
}

impl Handler {
    /// Builds the handler for `kind`.
    ///
    /// `field_print` takes a comma separated list of field paths,
    /// `script_inline` the script text and `script_file` a path to the script.
    pub fn from_kind(kind: HandlerKind, param: Option<&str>) -> AvroResult<Self> {
        let require =
            || param.ok_or_else(|| Details::MissingHandlerParam(<&'static str>::from(kind)));
        Ok(match kind {
            HandlerKind::Cat => Handler::Cat,
            HandlerKind::Json => Handler::Json,
            HandlerKind::FieldPrint => {
                Handler::FieldPrint(require()?.split(',').map(FieldPath::parse).collect())
            }
            HandlerKind::ScriptInline => {
                Handler::Script(ScriptSource::Inline(require()?.to_string()))
            }
            HandlerKind::ScriptFile => Handler::Script(ScriptSource::from_file(require()?)?),
        })
    }
}

/// A shared, line-atomic output destination.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes `text` with a single locked `write_all`.
    pub fn emit(&self, text: &str) -> AvroResult<()> {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writer
            .write_all(text.as_bytes())
            .map_err(|e| Details::WriteOutput(e).into())
    }

    pub fn flush(&self) -> AvroResult<()> {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush().map_err(|e| Details::WriteOutput(e).into())
    }
}

/// Worker pool settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, bon::Builder)]
pub struct DispatchConfig {
    /// Handler threads; `0` and `1` run the handler on the calling thread.
    #[builder(default = 1)]
    pub threads: usize,
    /// Records that may wait for a worker before dispatch blocks.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A [`Handler`] ready to run, with its own script runtime if it needs one.
pub enum Callback {
    Cat,
    Json,
    FieldPrint(Vec<FieldPath>),
    Script(ScriptCallback),
}

impl Callback {
    pub fn instantiate(handler: &Handler, engine: &dyn ScriptEngine) -> AvroResult<Self> {
        Ok(match handler {
            Handler::Cat => Callback::Cat,
            Handler::Json => Callback::Json,
            Handler::FieldPrint(paths) => Callback::FieldPrint(paths.clone()),
            Handler::Script(source) => Callback::Script(ScriptCallback::new(source, engine)?),
        })
    }

    pub fn invoke(&mut self, value: &Value<'_>, sink: &OutputSink) -> AvroResult<()> {
        let mut out = match self {
            Callback::Cat => render(value, 0),
            Callback::Json => serde_json::to_string(value).map_err(Details::SerializeValueToJson)?,
            Callback::FieldPrint(paths) => field_line(value, paths),
            Callback::Script(script) => return script.call(value),
        };
        out.push('\n');
        sink.emit(&out)
    }
}

fn field_line(value: &Value<'_>, paths: &[FieldPath]) -> String {
    paths
        .iter()
        .map(|path| match resolve(value, path) {
            Ok(Value::Null) => String::new(),
            Ok(field) => render(field, 0),
            Err(e) => e.marker().to_string(),
        })
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

/// Runs a [`Handler`] for each record, inline or on a worker pool.
pub struct Dispatcher {
    sink: OutputSink,
    mode: Mode,
}

enum Mode {
    Inline(Callback),
    Pool(Pool),
}

/// Pool bookkeeping shared with the workers.
#[derive(Default)]
struct Shared {
    progress: Mutex<Progress>,
    idle: Condvar,
}

#[derive(Default)]
struct Progress {
    /// Records queued or being handled.
    pending: usize,
    /// Workers still taking records.
    live: usize,
    /// First failure since the last barrier.
    failure: Option<Error>,
}

impl Shared {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, error: Error) {
        let mut progress = self.progress();
        if progress.failure.is_none() {
            progress.failure = Some(error);
        }
    }

    fn take_failure(&self) -> AvroResult<()> {
        self.progress().failure.take().map_or(Ok(()), Err)
    }
}

/// Marks a received record as handled, also when its handler panics.
struct JobDone<'s>(&'s Shared);

impl Drop for JobDone<'_> {
    fn drop(&mut self) {
        let mut progress = self.0.progress();
        progress.pending = progress.pending.saturating_sub(1);
        if thread::panicking() && progress.failure.is_none() {
            progress.failure = Some(Details::WorkerPanicked.into());
        }
        self.0.idle.notify_all();
    }
}

/// Takes a worker out of the live count when its thread ends.
struct WorkerGone<'s>(&'s Shared);

impl Drop for WorkerGone<'_> {
    fn drop(&mut self) {
        self.0.progress().live -= 1;
        self.0.idle.notify_all();
    }
}

struct Pool {
    sender: Option<SyncSender<Value<'static>>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl Pool {
    fn submit(&mut self, value: Value<'static>) -> AvroResult<()> {
        self.shared.take_failure()?;
        let Some(sender) = &self.sender else {
            return Err(Details::DispatchClosed.into());
        };
        self.shared.progress().pending += 1;
        if sender.send(value).is_err() {
            self.shared.progress().pending -= 1;
            // every worker is gone; report why
            self.shutdown()?;
            return Err(Details::DispatchClosed.into());
        }
        Ok(())
    }

    /// Blocks until no record is queued or being handled.
    fn barrier(&self) -> AvroResult<()> {
        let progress = self.shared.progress();
        let mut progress = self
            .shared
            .idle
            .wait_while(progress, |p| p.pending > 0 && p.live > 0)
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(failure) = progress.failure.take() {
            return Err(failure);
        }
        if progress.pending > 0 {
            return Err(Details::DispatchClosed.into());
        }
        Ok(())
    }

    /// Closes the queue and waits for every worker, keeping the first error.
    fn shutdown(&mut self) -> AvroResult<()> {
        drop(self.sender.take());
        let mut panicked = false;
        for worker in self.workers.drain(..) {
            panicked |= worker.join().is_err();
        }
        self.shared.take_failure()?;
        if panicked {
            return Err(Details::WorkerPanicked.into());
        }
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl Dispatcher {
    pub fn new(
        handler: &Handler,
        sink: OutputSink,
        config: DispatchConfig,
        engine: Arc<dyn ScriptEngine>,
    ) -> AvroResult<Self> {
        // validates the handler, for instance by compiling the script
        let callback = Callback::instantiate(handler, engine.as_ref())?;
        if config.threads <= 1 {
            return Ok(Dispatcher {
                sink,
                mode: Mode::Inline(callback),
            });
        }
        drop(callback);

        let (sender, receiver) = sync_channel::<Value<'static>>(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared::default());
        let mut pool = Pool {
            sender: Some(sender),
            workers: Vec::with_capacity(config.threads),
            shared: Arc::clone(&shared),
        };
        for id in 0..config.threads {
            let handler = handler.clone();
            let engine = Arc::clone(&engine);
            let receiver = Arc::clone(&receiver);
            let sink = sink.clone();
            let shared = Arc::clone(&shared);
            shared.progress().live += 1;
            let worker = thread::Builder::new()
                .name(format!("avro-peek-worker-{id}"))
                .spawn(move || run_worker(&receiver, &handler, engine.as_ref(), &sink, &shared));
            match worker {
                Ok(worker) => pool.workers.push(worker),
                Err(e) => {
                    pool.shared.progress().live -= 1;
                    return Err(Details::SpawnWorker(e).into());
                }
            }
        }
        debug!(
            "Started {} workers with a queue of {}",
            config.threads, config.queue_capacity
        );

        Ok(Dispatcher {
            sink,
            mode: Mode::Pool(pool),
        })
    }

    /// Runs the handler for `value`, or queues a copy of it for a worker.
    ///
    /// In pool mode this fails with the first error a worker hit since the
    /// last [`barrier`](Self::barrier).
    pub fn dispatch(&mut self, value: Value<'_>) -> AvroResult<()> {
        match &mut self.mode {
            Mode::Inline(callback) => callback.invoke(&value, &self.sink),
            Mode::Pool(pool) => pool.submit(value.into_owned()),
        }
    }

    /// Waits until every record dispatched so far has been handled.
    ///
    /// Returns the first handler error since the previous barrier, so output
    /// and failures can be attributed to the records dispatched in between.
    pub fn barrier(&mut self) -> AvroResult<()> {
        match &self.mode {
            Mode::Inline(_) => Ok(()),
            Mode::Pool(pool) => pool.barrier(),
        }
    }

    /// Waits for queued records to be handled and flushes the sink.
    ///
    /// Returns the first error any worker hit.
    pub fn finish(mut self) -> AvroResult<()> {
        if let Mode::Pool(pool) = &mut self.mode {
            pool.shutdown()?;
        }
        self.sink.flush()
    }
}

fn run_worker(
    receiver: &Mutex<Receiver<Value<'static>>>,
    handler: &Handler,
    engine: &dyn ScriptEngine,
    sink: &OutputSink,
    shared: &Shared,
) {
    let _gone = WorkerGone(shared);
    let mut callback = match Callback::instantiate(handler, engine) {
        Ok(callback) => callback,
        Err(e) => return shared.fail(e),
    };
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(value) = job else {
            return;
        };
        let _done = JobDone(shared);
        if let Err(e) = callback.invoke(&value, sink) {
            shared.fail(e);
        }
    }
}

/// Reads `path` and dispatches each record, stopping after `max_records`.
///
/// Waits for the file's records to be handled before returning, so a handler
/// error fails the file that produced it. Returns the number of records
/// dispatched.
pub fn process_file(
    path: &Path,
    max_records: Option<usize>,
    dispatcher: &mut Dispatcher,
) -> AvroResult<usize> {
    let mut reader = ContainerReader::builder(path)
        .maybe_max_records(max_records)
        .build()?;
    let read = reader.for_each(|value| dispatcher.dispatch(value));
    reader.close();
    // drain even after a failure, so nothing of this file outlives it
    let drained = dispatcher.barrier();
    let count = read?;
    drained?;
    info!("{}: {count} records", path.display());
    Ok(count)
}
