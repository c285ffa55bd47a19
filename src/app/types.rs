use super::config::{WIFI_PASSWORD_MAX, WIFI_SSID_MAX};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CredentialError {
    EmptySsid,
    TooLong,
}

/// Station credentials held in fixed-capacity fields. Construction is
/// bounds-checked, so the stored bytes are always valid UTF-8 slices of the
/// declared lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WifiCredentials {
    ssid: [u8; WIFI_SSID_MAX],
    ssid_len: u8,
    password: [u8; WIFI_PASSWORD_MAX],
    password_len: u8,
}

impl WifiCredentials {
    pub(crate) fn from_parts(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        if ssid.is_empty() {
            return Err(CredentialError::EmptySsid);
        }
        if ssid.len() > WIFI_SSID_MAX || password.len() > WIFI_PASSWORD_MAX {
            return Err(CredentialError::TooLong);
        }

        let mut credentials = Self {
            ssid: [0u8; WIFI_SSID_MAX],
            ssid_len: ssid.len() as u8,
            password: [0u8; WIFI_PASSWORD_MAX],
            password_len: password.len() as u8,
        };
        credentials.ssid[..ssid.len()].copy_from_slice(ssid.as_bytes());
        credentials.password[..password.len()].copy_from_slice(password.as_bytes());
        Ok(credentials)
    }

    pub(crate) fn ssid(&self) -> &str {
        core::str::from_utf8(&self.ssid[..self.ssid_len as usize]).unwrap_or("")
    }

    pub(crate) fn password(&self) -> &str {
        core::str::from_utf8(&self.password[..self.password_len as usize]).unwrap_or("")
    }
}

/// Asynchronous notifications from the radio driver, serialized through the
/// `LINK_EVENTS` channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkEvent {
    AssociationStarted,
    Disassociated,
    AddressAcquired,
}

impl LinkEvent {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::AssociationStarted => "association_started",
            Self::Disassociated => "disassociated",
            Self::AddressAcquired => "address_acquired",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkOutcome {
    Connected,
    Failed,
}

impl LinkOutcome {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}
