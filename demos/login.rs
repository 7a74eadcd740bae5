//! Example: logging in to the BJTU MIS portal.
//!
//! Run with: BJTU_USERNAME=21301234 BJTU_PASSWORD=... cargo run --example login
//!
//! The captcha is saved to `captcha.png`. Type its answer when prompted, or
//! press Enter to let the on-device model solve it (`--features onnx`).

use bjtu_cas::{CaptchaDisplay, CasSession};
use std::io::{self, BufRead, Write};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for debug output (optional)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let username = std::env::var("BJTU_USERNAME")?;
    let password = std::env::var("BJTU_PASSWORD")?;

    let mut session = CasSession::builder()
        // Optionally add proxy:
        // .proxy("socks5://127.0.0.1:1080")
        .build()?;

    for _ in 0..3 {
        match session.fetch_captcha_for_display().await {
            CaptchaDisplay::Ready { image, .. } => {
                std::fs::write("captcha.png", &image)?;
                println!("Captcha saved to captcha.png");
            }
            CaptchaDisplay::AlreadyLoggedIn(outcome) => {
                println!("{}", outcome.message);
                break;
            }
            CaptchaDisplay::Failed(outcome) => {
                anyhow::bail!("Could not load the login page: {}", outcome.message);
            }
        }

        print!("Captcha answer (empty to auto-solve): ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let answer = answer.trim();
        let captcha = (!answer.is_empty()).then_some(answer);

        let outcome = session.login(&username, &password, captcha).await;
        println!("{}", outcome.message);
        if outcome.success {
            break;
        }
    }

    if let Some(identity) = session.current_identity() {
        println!("Name:       {}", identity.name);
        println!("Student ID: {}", identity.student_id);
        if let Some(major) = &identity.major {
            println!("Major:      {}", major);
        }
        if let Some(college) = &identity.college {
            println!("College:    {}", college);
        }
    }

    let status = session.check_auth_status().await;
    println!("Status check: {}", status.message);

    Ok(())
}
