use log::warn;
use std::sync::OnceLock;

static LOCAL_HOSTNAME: OnceLock<String> = OnceLock::new();

/// Hostname of this machine, read once per process.
///
/// Falls back to `localhost` when the OS refuses to tell us.
pub fn local_hostname() -> &'static str {
    LOCAL_HOSTNAME.get_or_init(|| match ::hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy().trim().to_string();
            if name.is_empty() {
                warn!("Empty hostname reported, using `localhost` for now");
                "localhost".to_string()
            } else {
                name
            }
        }
        Err(e) => {
            warn!("Error retrieving hostname ({}), using `localhost` for now", e);
            "localhost".to_string()
        }
    })
}
