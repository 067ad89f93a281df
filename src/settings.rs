/// Settings popup logic: status text, port input and the "Sync now" round trip
use crate::error::{ExtensionError, Result};
use crate::protocol::{SYNC_TIMEOUT_MS, SyncState, TRIGGER_SETTLE_MS, validate_port};
use futures::FutureExt;
use futures::future::{Either, LocalBoxFuture, select};

const TARGET: &str = "ft-popup";

/// Browser services the popup drives
#[allow(async_fn_in_trait)]
pub trait PopupHost: Clone + 'static {
    /// An open tab on `http://localhost:{port}`, if any
    async fn find_tracker_tab(&self, port: u16) -> Result<Option<i32>>;

    async fn send_trigger_sync(&self, tab_id: i32) -> Result<()>;

    async fn read_sync_state(&self) -> Result<Option<SyncState>>;

    async fn open_tab(&self, url: &str, active: bool) -> Result<i32>;

    async fn close_tab(&self, tab_id: i32) -> Result<()>;

    /// Resolves with the next persisted sync state. Listening starts when
    /// this is called, not when the future is first polled.
    fn next_sync_state(&self) -> LocalBoxFuture<'static, Option<SyncState>>;

    /// Timer that starts when this is called
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()>;

    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

pub fn tracker_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Port from the text field: leading digits only, like `parseInt`
pub fn parse_port_input(input: &str) -> Option<u16> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();

    digits
        .parse::<i64>()
        .ok()
        .and_then(|port| validate_port(port).ok())
}

/// Relative age of the last sync, e.g. "Synced 5m ago"
pub fn format_sync_age(age_ms: f64, date_label: &str) -> String {
    let seconds = (age_ms / 1000.0).floor() as i64;
    let minutes = seconds.div_euclid(60);
    let hours = minutes.div_euclid(60);

    if seconds < 60 {
        "Synced just now".to_string()
    } else if minutes < 60 {
        format!("Synced {}m ago", minutes)
    } else if hours < 24 {
        format!("Synced {}h ago", hours)
    } else {
        format!("Synced {}", date_label)
    }
}

/// Status line shown at the top of the popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub synced: bool,
}

/// Build the status line; `age_of` turns an ISO timestamp into (age in ms, date label)
pub fn describe_sync_state<F>(state: Option<&SyncState>, age_of: F) -> StatusLine
where
    F: Fn(&str) -> (f64, String),
{
    match state.and_then(|s| s.last_synced_at.as_deref().map(|at| (at, s.entry_count))) {
        Some((at, entry_count)) => {
            let (age_ms, date_label) = age_of(at);
            StatusLine {
                text: format!("{} ({} entries)", format_sync_age(age_ms, &date_label), entry_count),
                synced: true,
            }
        }
        None => StatusLine {
            text: "Not synced yet. Open your tracker app to sync.".to_string(),
            synced: false,
        },
    }
}

/// User-facing text for a failed "Sync now"
pub fn failure_message(err: &ExtensionError) -> String {
    match err {
        ExtensionError::Timeout { .. } => "Sync timed out. Is the tracker running?".to_string(),
        ExtensionError::Transport(_) => "Sync failed. Reload the tracker tab.".to_string(),
        _ => "Sync failed".to_string(),
    }
}

/// Ask the tracker app to sync and wait for the result, bounded by the sync timeout.
///
/// With a tracker tab already open it is sent TRIGGER_SYNC directly. Otherwise
/// the tracker is opened in a background tab, which syncs on load, and the tab
/// is closed once the new sync state lands. That close also happens when the
/// sync lands after the timeout was already reported.
pub async fn sync_now<H: PopupHost>(host: &H, port: u16) -> Result<Option<SyncState>> {
    let deadline = host.sleep(SYNC_TIMEOUT_MS);

    match host.find_tracker_tab(port).await? {
        Some(tab_id) => {
            log::debug!(target: TARGET, "Triggering sync in tab {}", tab_id);
            let work = async {
                host.send_trigger_sync(tab_id).await?;
                host.sleep(TRIGGER_SETTLE_MS).await;
                host.read_sync_state().await
            }
            .boxed_local();

            match select(work, deadline).await {
                Either::Left((result, _)) => result,
                Either::Right(_) => Err(ExtensionError::Timeout { ms: SYNC_TIMEOUT_MS }),
            }
        }
        None => {
            let synced = host.next_sync_state();
            let tab_id = host.open_tab(&tracker_url(port), false).await?;
            log::debug!(target: TARGET, "Opened tracker in background tab {}", tab_id);

            match select(synced, deadline).await {
                Either::Left((state, _)) => {
                    close_quietly(host, tab_id).await;
                    state
                        .map(Some)
                        .ok_or_else(|| ExtensionError::Transport("storage listener went away".to_string()))
                }
                Either::Right((_, synced)) => {
                    let cleanup_host = host.clone();
                    host.spawn(
                        async move {
                            if synced.await.is_some() {
                                close_quietly(&cleanup_host, tab_id).await;
                            }
                        }
                        .boxed_local(),
                    );
                    Err(ExtensionError::Timeout { ms: SYNC_TIMEOUT_MS })
                }
            }
        }
    }
}

async fn close_quietly<H: PopupHost>(host: &H, tab_id: i32) {
    if let Err(e) = host.close_tab(tab_id).await {
        log::debug!(target: TARGET, "Could not close tab {}: {}", tab_id, e);
    }
}
