//! 服务器证书信任策略。

use tracing::{info, warn};

use crate::client::{CertificateInfo, CertificatePolicy};
use crate::types::StatusCode;

/// 默认策略：只在显式开启自动接受时接受“未受信任”错误，其余一律拒绝。
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCertificatePolicy {
    auto_accept_untrusted: bool,
}

impl DefaultCertificatePolicy {
    pub fn new(auto_accept_untrusted: bool) -> Self {
        Self {
            auto_accept_untrusted,
        }
    }
}

impl CertificatePolicy for DefaultCertificatePolicy {
    fn validate(&self, certificate: &CertificateInfo, error: StatusCode) -> bool {
        let accepted = self.auto_accept_untrusted && error == StatusCode::BAD_CERTIFICATE_UNTRUSTED;
        if accepted {
            info!(
                target: "gw.protocol",
                subject = %certificate.subject,
                thumbprint = %certificate.thumbprint,
                error = %error,
                "certificate_accepted"
            );
        } else {
            warn!(
                target: "gw.protocol",
                subject = %certificate.subject,
                thumbprint = %certificate.thumbprint,
                error = %error,
                "certificate_rejected"
            );
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> CertificateInfo {
        CertificateInfo {
            subject: "CN=plant-server".to_string(),
            thumbprint: "AB12".to_string(),
        }
    }

    #[test]
    fn accepts_only_untrusted_with_flag() {
        let policy = DefaultCertificatePolicy::new(true);
        assert!(policy.validate(&cert(), StatusCode::BAD_CERTIFICATE_UNTRUSTED));
        assert!(!policy.validate(&cert(), StatusCode::BAD_CERTIFICATE_INVALID));
    }

    #[test]
    fn rejects_everything_without_flag() {
        let policy = DefaultCertificatePolicy::new(false);
        assert!(!policy.validate(&cert(), StatusCode::BAD_CERTIFICATE_UNTRUSTED));
    }
}
