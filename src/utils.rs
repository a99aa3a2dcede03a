/// Keeps a short prefix of a credential for log lines.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        return "***".to_string();
    }
    format!("{visible}***")
}
