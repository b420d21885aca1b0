//! Favicon services, in the order they are tried
//!
//! Each provider is a URL template with a `{domain}` placeholder plus the
//! traits the scorer rewards. Lookup code treats them uniformly.

use crate::probe::is_slow_region;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoProvider {
    pub name: Cow<'static, str>,
    /// URL with a `{domain}` placeholder
    pub template: Cow<'static, str>,
    /// Dedicated favicon service known for clean, consistent output
    #[serde(default)]
    pub professional: bool,
    /// Request asks for a large (>= 128px) icon
    #[serde(default)]
    pub large_size: bool,
}

impl LogoProvider {
    pub fn new(name: impl Into<String>, template: impl Into<String>, professional: bool, large_size: bool) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            template: Cow::Owned(template.into()),
            professional,
            large_size,
        }
    }

    pub fn url_for(&self, domain: &str) -> String {
        self.template.replace("{domain}", domain)
    }
}

const fn provider(
    name: &'static str,
    template: &'static str,
    professional: bool,
    large_size: bool,
) -> LogoProvider {
    LogoProvider {
        name: Cow::Borrowed(name),
        template: Cow::Borrowed(template),
        professional,
        large_size,
    }
}

pub const GENERAL_PROVIDERS: &[LogoProvider] = &[
    provider("iowen", "https://api.iowen.cn/favicon/{domain}.png", false, false),
    provider(
        "gstatic",
        "https://t2.gstatic.com/faviconV2?client=SOCIAL&type=FAVICON&fallback_opts=TYPE,SIZE,URL&url=https://{domain}&size=128",
        false,
        true,
    ),
    provider("google", "https://www.google.com/s2/favicons?sz=128&domain={domain}", false, true),
    provider("github", "https://favicons.githubusercontent.com/{domain}", false, false),
    provider("duckduckgo", "https://icons.duckduckgo.com/ip3/{domain}.ico", false, false),
    provider("favicon.im", "https://favicon.im/{domain}?larger=true", false, true),
    provider("faviconkit", "https://api.faviconkit.com/{domain}/128", true, true),
];

/// Order for `.cn`-family domains, where mainland mirrors answer first
pub const SLOW_REGION_PROVIDERS: &[LogoProvider] = &[
    provider("dnspod", "https://statics.dnspod.cn/proxy_favicon/_/favicon?domain={domain}", false, false),
    provider("iowen", "https://api.iowen.cn/favicon/{domain}.png", false, false),
    provider("favicon.link", "https://favicon.link/f/{domain}", false, false),
    provider("icon.horse", "https://icon.horse/icon/{domain}?size=large", true, true),
    provider(
        "gstatic",
        "https://t2.gstatic.com/faviconV2?client=SOCIAL&type=FAVICON&fallback_opts=TYPE,SIZE,URL&url=https://{domain}&size=128",
        false,
        true,
    ),
    provider("google", "https://www.google.com/s2/favicons?sz=128&domain={domain}", false, true),
    provider("faviconkit", "https://api.faviconkit.com/{domain}/128", true, true),
];

/// Provider list to use for `domain`
pub fn providers_for(domain: &str) -> &'static [LogoProvider] {
    if is_slow_region(domain) {
        SLOW_REGION_PROVIDERS
    } else {
        GENERAL_PROVIDERS
    }
}

/// Well-known favicon locations on the site itself
pub fn direct_favicon_urls(domain: &str) -> Vec<String> {
    ["https", "http"]
        .iter()
        .flat_map(|scheme| {
            ["favicon.ico", "favicon.png"]
                .iter()
                .map(move |file| format!("{}://{}/{}", scheme, domain, file))
        })
        .collect()
}
