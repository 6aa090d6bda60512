//! Progress reporting and cancellation.
//!
//! The caller passes an optional callback. It is invoked synchronously at
//! ≥1 % increments during assembly, once per radiation iteration and once
//! per accepted time step. Returning [`ControlFlow::Break`] requests
//! cancellation; the solver honours it at the next step boundary and
//! returns [`crate::Error::Cancelled`] with the data accepted so far.

use std::ops::ControlFlow;

/// Matrix being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    Conductivity,
    Capacity,
}

/// A progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Fraction of elements processed.
    Assembly { stage: AssemblyStage, fraction: f64 },
    /// Radiation re-linearisation (steady state).
    Iteration { iteration: usize, change: f64 },
    /// An accepted and emitted time step.
    TimeStep {
        step: usize,
        time: f64,
        dt: f64,
        fraction: f64,
    },
}

/// Optional progress callback accepted by the solver entry points.
pub type Progress<'a> = Option<&'a mut dyn FnMut(ProgressEvent) -> ControlFlow<()>>;

/// Wraps the caller's callback and throttles assembly events.
pub(crate) struct Reporter<'a> {
    callback: Progress<'a>,
    stage: Option<AssemblyStage>,
    last_fraction: f64,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(callback: Progress<'a>) -> Self {
        Self {
            callback,
            stage: None,
            last_fraction: 0.0,
        }
    }

    /// Forward an event; `Break` when the caller asked to stop.
    pub(crate) fn report(&mut self, event: ProgressEvent) -> ControlFlow<()> {
        match self.callback.as_mut() {
            Some(callback) => callback(event),
            None => ControlFlow::Continue(()),
        }
    }

    /// Report `done` of `total` elements, at most once per percent.
    pub(crate) fn assembly(
        &mut self,
        stage: AssemblyStage,
        done: usize,
        total: usize,
    ) -> ControlFlow<()> {
        if self.callback.is_none() {
            return ControlFlow::Continue(());
        }
        if self.stage != Some(stage) {
            self.stage = Some(stage);
            self.last_fraction = 0.0;
        }
        let fraction = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        if fraction - self.last_fraction >= 0.01 || done == total {
            self.last_fraction = fraction;
            return self.report(ProgressEvent::Assembly { stage, fraction });
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_throttling() {
        let mut events = Vec::new();
        let mut callback = |e: ProgressEvent| {
            events.push(e);
            ControlFlow::Continue(())
        };
        let mut reporter = Reporter::new(Some(&mut callback));
        for done in 1..=1000 {
            let _ = reporter.assembly(AssemblyStage::Conductivity, done, 1000);
        }
        drop(reporter);
        assert!(events.len() <= 101);
        assert!(events.len() >= 50);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Assembly {
                stage: AssemblyStage::Conductivity,
                fraction: 1.0
            })
        );
    }

    #[test]
    fn test_break_propagates() {
        let mut callback = |_: ProgressEvent| ControlFlow::Break(());
        let mut reporter = Reporter::new(Some(&mut callback));
        assert!(reporter
            .report(ProgressEvent::Iteration {
                iteration: 1,
                change: 0.0
            })
            .is_break());
    }

    #[test]
    fn test_silent_reporter() {
        let mut reporter = Reporter::new(None);
        assert!(reporter.assembly(AssemblyStage::Capacity, 1, 2).is_continue());
    }
}
