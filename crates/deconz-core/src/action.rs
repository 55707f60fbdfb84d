// ── Device actions ──

use std::sync::Arc;
use std::time::Duration;

use deconz_api::HubClient;
use tracing::{debug, info, warn};

use crate::model::{Device, PropertyValue};
use crate::notification::Notifier;

const FADE_PROPERTY: &str = "bri";
const FADE_STEPS: u32 = 20;
const FADE_STEP: i64 = 5;
const FADE_PERIOD: Duration = Duration::from_millis(500);

/// Host-invokable device actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Action {
    /// Step brightness down until off or at its floor.
    #[strum(to_string = "fade", serialize = "fade_off")]
    Fade,
}

impl Action {
    /// The property the action drives. It must exist and be writable.
    pub fn target_property(self) -> &'static str {
        match self {
            Self::Fade => FADE_PROPERTY,
        }
    }
}

/// Lower brightness by 5 every 500 ms, 20 times, through the normal write
/// path. Stops early when the device is deactivated.
pub(crate) async fn fade(
    device: Arc<Device>,
    client: HubClient,
    write_timeout: Duration,
    notifier: Notifier,
) {
    let cancel = device.cancel_token().clone();
    info!(device = %device.unique_id(), "fade started");

    for step in 0..FADE_STEPS {
        let Some(current) = device
            .property_value(FADE_PROPERTY)
            .await
            .and_then(|v| v.as_i64())
        else {
            warn!(device = %device.unique_id(), "no brightness value, fade aborted");
            return;
        };

        let next = PropertyValue::Integer(current - FADE_STEP);
        if let Err(e) = device
            .write_property(FADE_PROPERTY, next, &client, write_timeout, &notifier)
            .await
        {
            debug!(device = %device.unique_id(), step, error = %e, "fade step failed");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(device = %device.unique_id(), step, "fade cancelled");
                return;
            }
            () = tokio::time::sleep(FADE_PERIOD) => {}
        }
    }

    info!(device = %device.unique_id(), "fade finished");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!("fade".parse::<Action>().unwrap(), Action::Fade);
        assert_eq!("fade_off".parse::<Action>().unwrap(), Action::Fade);
        assert!("blink".parse::<Action>().is_err());
        assert_eq!(Action::Fade.to_string(), "fade");
        assert_eq!(Action::Fade.target_property(), "bri");
    }
}
