//! Runtime classification.
//!
//! The injected provider is inspected once here; everything downstream matches on
//! [`Platform`] instead of re-inspecting the environment.

use serde::{Deserialize, Serialize};

use crate::domain::ProviderMarkers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    DesktopWithExtension,
    DesktopWithoutExtension,
    MobileIos,
    MobileAndroid,
    /// A mobile browser with no app store to send the user to.
    MobileNoApp,
}

impl Platform {
    pub fn is_mobile(self) -> bool {
        matches!(
            self,
            Platform::MobileIos | Platform::MobileAndroid | Platform::MobileNoApp
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSignals {
    pub user_agent: String,
    pub markers: ProviderMarkers,
}

const MOBILE_TOKENS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn detect_platform(signals: &EnvironmentSignals) -> Platform {
    let ua = signals.user_agent.to_ascii_lowercase();
    if ["iphone", "ipad", "ipod"].iter().any(|t| ua.contains(t)) {
        return Platform::MobileIos;
    }
    if ua.contains("android") {
        return Platform::MobileAndroid;
    }
    if MOBILE_TOKENS.iter().any(|t| ua.contains(t)) {
        return Platform::MobileNoApp;
    }
    if signals.markers.any() {
        Platform::DesktopWithExtension
    } else {
        Platform::DesktopWithoutExtension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(ua: &str, theta: bool) -> EnvironmentSignals {
        EnvironmentSignals {
            user_agent: ua.to_owned(),
            markers: ProviderMarkers {
                theta,
                metamask: false,
            },
        }
    }

    #[test]
    fn classifies_user_agents() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8)";
        let blackberry = "Mozilla/5.0 (BlackBerry; U; BlackBerry 9800)";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0";

        assert_eq!(detect_platform(&signals(iphone, true)), Platform::MobileIos);
        assert_eq!(detect_platform(&signals(android, false)), Platform::MobileAndroid);
        assert_eq!(detect_platform(&signals(blackberry, false)), Platform::MobileNoApp);
        assert_eq!(
            detect_platform(&signals(desktop, true)),
            Platform::DesktopWithExtension
        );
        assert_eq!(
            detect_platform(&signals(desktop, false)),
            Platform::DesktopWithoutExtension
        );
    }
}
