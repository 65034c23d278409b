/// Receives the validation loss every `callback_every` epochs.
///
/// Observers only watch; stopping decisions stay with the trainer.
pub trait EpochObserver {
    fn on_epoch_end(&mut self, epoch: usize, val_loss: &[f64]);
}

impl<F> EpochObserver for F
where
    F: FnMut(usize, &[f64]),
{
    fn on_epoch_end(&mut self, epoch: usize, val_loss: &[f64]) {
        self(epoch, val_loss)
    }
}
