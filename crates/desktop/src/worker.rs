//! Background requests: one thread with its own current-thread runtime per request,
//! reporting back over an mpsc channel that the UI polls each frame.

use std::sync::mpsc;

pub fn run_in_background<T, F>(work: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce(&tokio::runtime::Runtime) -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => {
                let _ = tx.send(work(&rt));
            }
            // Dropping `tx` disconnects the receiver; the view treats that as a failed request.
            Err(e) => log::error!("starting request runtime: {}", e),
        }
    });
    rx
}

/// Result of polling a background request.
pub enum Poll<T> {
    Pending,
    Ready(T),
    Lost,
}

pub fn poll<T>(rx: &mpsc::Receiver<T>) -> Poll<T> {
    match rx.try_recv() {
        Ok(v) => Poll::Ready(v),
        Err(mpsc::TryRecvError::Empty) => Poll::Pending,
        Err(mpsc::TryRecvError::Disconnected) => Poll::Lost,
    }
}
