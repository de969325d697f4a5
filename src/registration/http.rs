// Sessiongate: HTTP token registration
//
// POSTs `token=<t>&identity=<id>...` as application/x-www-form-urlencoded.
// The response body is ignored; only the status matters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{RegistrationError, RegistrationService};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpRegistration {
    client: Client,
    endpoint: Url,
}

impl HttpRegistration {
    pub fn new(endpoint: Url) -> Result<Self, RegistrationError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn form_fields<'a>(push_token: &'a str, identities: &'a [String]) -> Vec<(&'static str, &'a str)> {
    std::iter::once(("token", push_token))
        .chain(identities.iter().map(|id| ("identity", id.as_str())))
        .collect()
}

#[async_trait]
impl RegistrationService for HttpRegistration {
    async fn register(
        &self,
        push_token: &str,
        identities: &[String],
    ) -> Result<(), RegistrationError> {
        tracing::debug!(endpoint = %self.endpoint, identities = identities.len(), "Registering push token");

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form_fields(push_token, identities))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistrationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_repeat_identity() {
        let ids = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(
            form_fields("t0k", &ids),
            vec![("token", "t0k"), ("identity", "alice"), ("identity", "bob")]
        );
        assert_eq!(form_fields("t0k", &[]), vec![("token", "t0k")]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // nothing listens on the discard port
        let endpoint = Url::parse("http://127.0.0.1:9/api/save_token").unwrap();
        let service = HttpRegistration::new(endpoint).unwrap();

        let result = service.register("t0k", &[]).await;
        assert!(matches!(result, Err(RegistrationError::Http(_))));
    }
}
