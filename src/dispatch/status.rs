use std::fmt;

/// Status classes the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Anything without special handling, including business-level 4xx.
    Normal,
    AuthExpired,
    Unauthorized,
    ServerError,
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Normal => write!(f, "normal"),
            StatusClass::AuthExpired => write!(f, "auth_expired"),
            StatusClass::Unauthorized => write!(f, "unauthorized"),
            StatusClass::ServerError => write!(f, "server_error"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusClassifier {
    auth_expired: u16,
    unauthorized: u16,
}

impl StatusClassifier {
    pub fn new(auth_expired: u16, unauthorized: u16) -> Self {
        Self {
            auth_expired,
            unauthorized,
        }
    }

    pub fn classify(&self, status: u16) -> StatusClass {
        if status == self.auth_expired {
            StatusClass::AuthExpired
        } else if status == self.unauthorized {
            StatusClass::Unauthorized
        } else if (500..600).contains(&status) {
            StatusClass::ServerError
        } else {
            StatusClass::Normal
        }
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(403, 401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_classes() {
        let classifier = StatusClassifier::default();
        assert_eq!(classifier.classify(200), StatusClass::Normal);
        assert_eq!(classifier.classify(204), StatusClass::Normal);
        assert_eq!(classifier.classify(400), StatusClass::Normal);
        assert_eq!(classifier.classify(404), StatusClass::Normal);
        assert_eq!(classifier.classify(401), StatusClass::Unauthorized);
        assert_eq!(classifier.classify(403), StatusClass::AuthExpired);
        assert_eq!(classifier.classify(500), StatusClass::ServerError);
        assert_eq!(classifier.classify(503), StatusClass::ServerError);
    }

    #[test]
    fn custom_auth_expired_status() {
        let classifier = StatusClassifier::new(419, 401);
        assert_eq!(classifier.classify(419), StatusClass::AuthExpired);
        assert_eq!(classifier.classify(403), StatusClass::Normal);
    }
}
