use crate::config::OutboundGatewayConfig;

/// Whether outbound requests should be redirected through the gateway.
///
/// An absent section or an absent `enabled` flag both mean "no": missing
/// configuration must never turn redirection on.
pub fn is_enabled(config: Option<&OutboundGatewayConfig>) -> bool {
    config.and_then(|c| c.enabled).unwrap_or(false)
}
