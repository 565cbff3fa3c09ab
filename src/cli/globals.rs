use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub sendgrid_api_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(sendgrid_api_key: SecretString) -> Self {
        Self { sendgrid_api_key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("SG.test-key".to_string()));
        assert_eq!(args.sendgrid_api_key.expose_secret(), "SG.test-key");
    }
}
