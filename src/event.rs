/// Something that happened during training, reported to a [TrainingObserver].
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// Emitted on every hundredth training batch.
    Progress {
        /// Zero-based epoch.
        epoch: usize,
        /// Zero-based batch index within the epoch.
        batch: usize,
        /// `batch * batch_len`, the items consumed before this batch.
        items_seen: usize,
        items_total: usize,
        /// Share of the epoch's batches already processed.
        percent: f64,
        loss: f64,
    },
    /// Emitted after the accuracy evaluation closing each epoch.
    EpochCompleted {
        /// Zero-based epoch.
        epoch: usize,
        num_epochs: usize,
        /// `None` when train accuracy reporting is disabled.
        train_accuracy: Option<f64>,
        test_accuracy: f64,
    },
    /// The test accuracy met the target and training stopped early.
    TargetReached { target: f64 },
}

/// Receives training events. Observers never influence control flow.
pub trait TrainingObserver {
    fn on_event(&mut self, event: &TrainingEvent);
}

/// Records every event, in order.
impl TrainingObserver for Vec<TrainingEvent> {
    fn on_event(&mut self, event: &TrainingEvent) {
        self.push(event.clone());
    }
}

/// Prints human-readable progress lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl TrainingObserver for ConsoleObserver {
    fn on_event(&mut self, event: &TrainingEvent) {
        log::info!("{event:?}");

        for line in render(event) {
            println!("{line}");
        }
    }
}

fn render(event: &TrainingEvent) -> Vec<String> {
    match event {
        TrainingEvent::Progress {
            epoch,
            items_seen,
            items_total,
            percent,
            loss,
            ..
        } => vec![format!(
            "Train Epoch: {epoch} [{items_seen}/{items_total} ({percent:.0}%)]\tLoss: {loss:.6}"
        )],
        TrainingEvent::EpochCompleted {
            epoch,
            num_epochs,
            train_accuracy,
            test_accuracy,
        } => {
            let mut lines = vec![format!("Epoch [{}/{num_epochs}]", epoch + 1)];
            if let Some(accuracy) = train_accuracy {
                lines.push(format!("Training Accuracy: {accuracy:.2}%"));
            }
            lines.push(format!("Testing Accuracy: {test_accuracy:.2}%"));
            lines
        }
        TrainingEvent::TargetReached { target } => {
            vec![format!("Reached target accuracy of {target:?}%!")]
        }
    }
}
