use tracing::{debug, info, warn};

use crate::platform::Platform;
use crate::ports::LinkOpenerPort;

/// Prefixes that replace `wc:`, in the order they are tried.
pub const WALLET_SCHEMES: &[&str] = &["thetawallet:", "theta:", "wc:"];

pub const IOS_APP_STORE_URL: &str = "https://apps.apple.com/app/theta-wallet/id1451094550";
pub const ANDROID_PLAY_STORE_URL: &str =
    "https://play.google.com/store/apps/details?id=org.thetatoken.wallet";

const ANDROID_PACKAGE: &str = "org.thetatoken.wallet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkOutcome {
    Opened(String),
    StoreFallback(String),
    Unavailable,
}

pub struct DeepLinkOpener<L> {
    opener: L,
}

impl<L: LinkOpenerPort> DeepLinkOpener<L> {
    pub fn new(opener: L) -> Self {
        Self { opener }
    }

    pub fn opener(&self) -> &L {
        &self.opener
    }

    /// Tries each wallet link for `uri` in order, then the store page.
    pub async fn open(&self, uri: &str, platform: Platform) -> DeepLinkOutcome {
        for candidate in candidate_links(uri, platform) {
            match self.opener.can_open(&candidate).await {
                Ok(true) => match self.opener.open(&candidate).await {
                    Ok(()) => {
                        info!(link = %redact(&candidate), "opened wallet app");
                        return DeepLinkOutcome::Opened(candidate);
                    }
                    Err(e) => warn!(error = %e, "open failed, trying next scheme"),
                },
                Ok(false) => debug!(link = %redact(&candidate), "scheme not openable"),
                Err(e) => debug!(error = %e, "openability check failed"),
            }
        }

        let Some(store) = store_url(platform) else {
            return DeepLinkOutcome::Unavailable;
        };
        match self.opener.open(store).await {
            Ok(()) => {
                info!(store, "wallet app missing, opened store page");
                DeepLinkOutcome::StoreFallback(store.to_owned())
            }
            Err(e) => {
                warn!(error = %e, "could not open store page");
                DeepLinkOutcome::Unavailable
            }
        }
    }
}

/// Ordered deep links for a relay URI on `platform`.
pub fn candidate_links(uri: &str, platform: Platform) -> Vec<String> {
    let mut links = Vec::with_capacity(WALLET_SCHEMES.len() + 1);
    if platform == Platform::MobileAndroid {
        links.push(format!(
            "intent://wc?uri={}#Intent;scheme=thetawallet;package={ANDROID_PACKAGE};end",
            urlencoding::encode(uri)
        ));
    }
    match uri.strip_prefix("wc:") {
        Some(rest) => links.extend(WALLET_SCHEMES.iter().map(|s| format!("{s}{rest}"))),
        None => links.push(uri.to_owned()),
    }
    links
}

pub fn store_url(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::MobileIos => Some(IOS_APP_STORE_URL),
        Platform::MobileAndroid => Some(ANDROID_PLAY_STORE_URL),
        Platform::MobileNoApp
        | Platform::DesktopWithExtension
        | Platform::DesktopWithoutExtension => None,
    }
}

// Pairing URIs carry a symmetric key; keep it out of logs.
fn redact(link: &str) -> &str {
    link.split_once('@').map_or(link, |(head, _)| head)
}
