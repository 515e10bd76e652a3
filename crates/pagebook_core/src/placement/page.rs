//! Active-page sources.
//!
//! Page turns are pushed through a `PageSignal`; `PageIndexProvider` is the
//! polled fallback used when no signal is wired.

use crate::model::record::PageIndex;
use log::debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Read access to the page the book currently shows.
pub trait PageIndexProvider {
    fn current_page(&self) -> PageIndex;
}

impl<F> PageIndexProvider for F
where
    F: Fn() -> PageIndex,
{
    fn current_page(&self) -> PageIndex {
        self()
    }
}

/// Sender half of a page-change channel. Cheap to clone across threads.
#[derive(Debug, Clone)]
pub struct PageSignal {
    sender: Sender<PageIndex>,
}

impl PageSignal {
    /// Announces a page turn. Returns `false` once the subscriber is gone.
    pub fn notify(&self, page: PageIndex) -> bool {
        self.sender.send(page).is_ok()
    }
}

/// Receiver half owned by the scene service.
#[derive(Debug)]
pub struct PageSubscription {
    receiver: Receiver<PageIndex>,
}

impl PageSubscription {
    /// Drains queued notifications, keeping only the newest page.
    pub fn drain_latest(&self) -> Option<PageIndex> {
        let latest = self.receiver.try_iter().last();
        if let Some(page) = latest {
            debug!("event=page_signal module=placement status=ok page={page}");
        }
        latest
    }
}

pub fn page_channel() -> (PageSignal, PageSubscription) {
    let (sender, receiver) = channel();
    (PageSignal { sender }, PageSubscription { receiver })
}

/// Page index shared between the page container and the scene service.
///
/// Setting a page also notifies the attached signal, if any.
#[derive(Debug, Clone, Default)]
pub struct SharedPage {
    page: Arc<AtomicU32>,
    signal: Option<PageSignal>,
}

impl SharedPage {
    pub fn new(page: PageIndex) -> Self {
        Self {
            page: Arc::new(AtomicU32::new(page)),
            signal: None,
        }
    }

    pub fn with_signal(mut self, signal: PageSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn set(&self, page: PageIndex) {
        let previous = self.page.swap(page, Ordering::SeqCst);
        if previous != page {
            if let Some(signal) = &self.signal {
                signal.notify(page);
            }
        }
    }

    pub fn get(&self) -> PageIndex {
        self.page.load(Ordering::SeqCst)
    }
}

impl PageIndexProvider for SharedPage {
    fn current_page(&self) -> PageIndex {
        self.get()
    }
}
