//! User-facing notifications.

use log::info;
use mdeck_settings::settings::DriveLetter;

/// A toast-style message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn mounted(name: &str, letter: DriveLetter) -> Self {
        Self {
            title: "Drive Mounted".into(),
            body: format!("{} is now available as {}:\\", name, letter),
        }
    }

    pub fn unmounted(name: &str, letter: DriveLetter) -> Self {
        Self {
            title: "Drive Unmounted".into(),
            body: format!("{} ({}:\\) has been disconnected", name, letter),
        }
    }

    pub fn mount_error(name: &str, message: &str) -> Self {
        Self {
            title: "Mount Failed".into(),
            body: format!("Failed to mount {}: {}", name, message),
        }
    }
}

/// Sink for user notifications. Delivery is best effort and must not
/// block the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn notify_mounted(&self, name: &str, letter: DriveLetter) {
        self.notify(Notification::mounted(name, letter));
    }

    fn notify_unmounted(&self, name: &str, letter: DriveLetter) {
        self.notify(Notification::unmounted(name, letter));
    }

    fn notify_mount_error(&self, name: &str, message: &str) {
        self.notify(Notification::mount_error(name, message));
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        info!("[{}] {}", n.title, n.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text() {
        let z = DriveLetter::new('Z').unwrap();
        assert_eq!(Notification::mounted("Box", z).body, "Box is now available as Z:\\");
        assert_eq!(
            Notification::unmounted("Box", z).body,
            "Box (Z:\\) has been disconnected"
        );
        let e = Notification::mount_error("Box", "auth failed");
        assert_eq!(e.title, "Mount Failed");
        assert_eq!(e.body, "Failed to mount Box: auth failed");
    }
}
