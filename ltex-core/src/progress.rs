//! Nested, weighted progress reporting.
//!
//! A [`ProgressStack`] represents one long-running operation. Sub-tasks are
//! started with a weight relative to the task that is currently on top of the
//! stack and occupy that fraction of its span. Finishing a sub-task moves its
//! parent to the end of the sub-task's span, no matter how many intermediate
//! updates the sub-task emitted.
//!
//! ```ignore
//! let mut progress = ProgressStack::new("Installing", sink);
//! {
//!     let mut download = progress.start_task(0.7, "Downloading");
//!     download.update_task(0.5, None);
//!     download.finish();
//! } // parent is now at 70%
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Receives absolute progress updates.
///
/// Implemented by the host (progress bar, notification, ...).
pub trait ProgressSink: Send + Sync {
    /// `fraction` is the overall completion in `[0, 1]`.
    fn report(&self, fraction: f64, message: &str);
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _fraction: f64, _message: &str) {}
}

#[derive(Debug, Clone)]
struct Frame {
    name: String,
    /// Absolute start of this frame in root units.
    start: f64,
    /// Absolute width of this frame in root units.
    span: f64,
    /// Completion within this frame.
    fraction: f64,
}

impl Frame {
    fn position(&self) -> f64 {
        self.start + self.span * self.fraction
    }
}

/// Stack of nested progress tasks feeding one sink.
pub struct ProgressStack {
    sink: Arc<dyn ProgressSink>,
    frames: Vec<Frame>,
}

impl ProgressStack {
    /// Creates a stack whose root task spans the whole operation.
    pub fn new(name: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            frames: vec![Frame {
                name: name.into(),
                start: 0.0,
                span: 1.0,
                fraction: 0.0,
            }],
        }
    }

    /// Overall completion in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        self.top().position()
    }

    /// Name of the task on top of the stack.
    pub fn task_name(&self) -> &str {
        &self.top().name
    }

    /// Number of open tasks, including the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Starts a sub-task taking `weight` of the current task's span.
    ///
    /// The returned guard derefs to the stack; call [`ProgressTask::finish`]
    /// on success. Dropping it without finishing pops the task and leaves the
    /// parent where the sub-task stopped.
    pub fn start_task(&mut self, weight: f64, name: impl Into<String>) -> ProgressTask<'_> {
        let parent = self.top();
        let weight = weight.clamp(0.0, 1.0);
        let start = parent.position();
        let remaining = parent.start + parent.span - start;
        let span = (parent.span * weight).min(remaining.max(0.0));
        self.frames.push(Frame {
            name: name.into(),
            start,
            span,
            fraction: 0.0,
        });
        self.emit();

        let depth = self.frames.len();
        ProgressTask {
            stack: self,
            depth,
            finished: false,
        }
    }

    /// Sets the completion of the current task and optionally renames it.
    pub fn update_task(&mut self, fraction: f64, name: Option<&str>) {
        let frame = self.top_mut();
        frame.fraction = fraction.clamp(0.0, 1.0);
        if let Some(name) = name {
            frame.name = name.to_string();
        }
        self.emit();
    }

    fn finish_frame(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        if let Some(child) = self.frames.pop() {
            let end = child.start + child.span;
            let parent = self.top_mut();
            if parent.span > 0.0 {
                parent.fraction = ((end - parent.start) / parent.span).clamp(0.0, 1.0);
            }
            self.emit();
        }
    }

    fn abandon_frame(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        if let Some(child) = self.frames.pop() {
            let reached = child.position();
            let parent = self.top_mut();
            if parent.span > 0.0 {
                parent.fraction = ((reached - parent.start) / parent.span).clamp(0.0, 1.0);
            }
        }
    }

    fn top(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn emit(&self) {
        let frame = self.top();
        self.sink.report(frame.position(), &frame.name);
    }
}

/// Guard for a running sub-task. See [`ProgressStack::start_task`].
pub struct ProgressTask<'a> {
    stack: &'a mut ProgressStack,
    depth: usize,
    finished: bool,
}

impl ProgressTask<'_> {
    /// Marks the task as complete, advancing the parent by the full weight.
    pub fn finish(mut self) {
        self.close(true);
    }

    fn close(&mut self, completed: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        // Pop any nested tasks that were leaked, then this one.
        while self.stack.frames.len() > self.depth {
            self.stack.abandon_frame();
        }
        if self.stack.frames.len() == self.depth {
            if completed {
                self.stack.finish_frame();
            } else {
                self.stack.abandon_frame();
            }
        }
    }
}

impl Deref for ProgressTask<'_> {
    type Target = ProgressStack;

    fn deref(&self) -> &ProgressStack {
        self.stack
    }
}

impl DerefMut for ProgressTask<'_> {
    fn deref_mut(&mut self) -> &mut ProgressStack {
        self.stack
    }
}

impl Drop for ProgressTask<'_> {
    fn drop(&mut self) {
        self.close(false);
    }
}
