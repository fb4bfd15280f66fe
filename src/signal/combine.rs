//! Merging several cancellation sources into one.

use super::{CancelReason, CancellationSource, ListenerId};
use parking_lot::Mutex;
use std::sync::Arc;

type Registrations = Arc<Mutex<Vec<(CancellationSource, ListenerId)>>>;

/// Derive a source that trips when any of `signals` trips.
///
/// If an input has already tripped, the result is returned tripped with that
/// input's reason and no listener is registered anywhere. Otherwise a one-shot
/// listener goes on every input; the first to fire trips the result with its
/// own reason and deregisters the others.
///
/// Listeners only hold a weak reference to the result, so a long-lived input
/// never keeps a dropped combination alive. Every call returns a new,
/// independent source.
pub fn combine(signals: &[CancellationSource]) -> CancellationSource {
    let combined = CancellationSource::new();

    if let Some(reason) = signals.iter().find_map(CancellationSource::reason) {
        combined.trip(reason);
        return combined;
    }

    let registrations: Registrations = Arc::new(Mutex::new(Vec::with_capacity(signals.len())));

    for signal in signals {
        let target = combined.downgrade();
        let siblings = registrations.clone();
        let listener = move |reason: &CancelReason| {
            if let Some(target) = target.upgrade() {
                target.trip(reason.clone());
            }
            release(&siblings);
        };

        match signal.on_trip(listener) {
            Some(id) => registrations.lock().push((signal.clone(), id)),
            None => {
                // Tripped between the scan above and registration.
                combined.trip(signal.reason().unwrap_or_default());
            }
        }

        if combined.is_tripped() {
            release(&registrations);
            break;
        }
    }

    combined
}

fn release(registrations: &Registrations) {
    let pending = std::mem::take(&mut *registrations.lock());
    for (signal, id) in pending {
        signal.remove_listener(id);
    }
}
