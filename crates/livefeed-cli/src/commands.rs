use anyhow::{bail, Result};
use tracing::warn;

use livefeed_core::{
    ApiError, AuthError, Config, LoginCredentials, Post, SessionController, SignupProfile, User,
};

use crate::{prompt, Command};

/// Whether a command failed because the session ended
pub fn is_session_ended(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<ApiError>() {
        return e.is_terminal();
    }
    err.downcast_ref::<AuthError>().is_some_and(AuthError::is_terminal)
}

pub async fn run(command: Command, controller: &SessionController, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => login(controller, config, email).await,
        Command::Signup {
            email,
            name,
            username,
            phone,
            date_of_birth,
        } => {
            let password = rpassword::prompt_password("Password: ")?;
            let profile = SignupProfile {
                user: User {
                    email,
                    name,
                    username,
                    phone,
                    date_of_birth,
                    image: String::new(),
                },
                password,
            };
            let user = controller.signup(&profile).await?;
            remember_email(config, &user.email);
            println!("Welcome, {}!", user.display_name());
            Ok(())
        }
        Command::Logout => {
            controller.logout().await?;
            println!("Logged out.");
            Ok(())
        }
        Command::Status => {
            if controller.is_logged_in() {
                match &config.last_email {
                    Some(email) => println!("Logged in as {}", email),
                    None => println!("Logged in"),
                }
            } else {
                println!("Logged out");
            }
            Ok(())
        }
        Command::Users => {
            require_session(controller)?;
            let users = controller.api().list_users().await?;
            for user in &users {
                println!("{:<24} {}", user.display_name(), user.email);
            }
            println!("{} user(s)", users.len());
            Ok(())
        }
        Command::UpdateProfile {
            name,
            username,
            phone,
            date_of_birth,
        } => {
            require_session(controller)?;
            let email = match config.last_email.clone() {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let updated = controller
                .api()
                .update_profile(&User {
                    email,
                    name,
                    username,
                    phone,
                    date_of_birth,
                    image: String::new(),
                })
                .await?;
            println!("Profile updated for {}", updated.display_name());
            Ok(())
        }
        Command::DeleteAccount { yes } => {
            require_session(controller)?;
            let email = match config.last_email.clone() {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            if !yes {
                let answer = prompt(&format!("Delete account {}? [y/N] ", email))?;
                if !answer.eq_ignore_ascii_case("y") {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            controller.delete_account(&email).await?;
            println!("Account deleted.");
            Ok(())
        }
        Command::Feed => {
            require_session(controller)?;
            print_posts(&controller.api().fetch_feed().await?);
            Ok(())
        }
        Command::Replies { conversation_id } => {
            require_session(controller)?;
            print_posts(&controller.api().fetch_replies(&conversation_id).await?);
            Ok(())
        }
        Command::Like { post_id } => {
            require_session(controller)?;
            controller.api().like_post(&post_id).await?;
            println!("Liked {}", post_id);
            Ok(())
        }
        Command::Unlike { post_id } => {
            require_session(controller)?;
            controller.api().unlike_post(&post_id).await?;
            println!("Unliked {}", post_id);
            Ok(())
        }
        Command::Comment { post_id, text } => {
            require_session(controller)?;
            controller.api().post_comment(&post_id, &text).await?;
            println!("Replied to {}", post_id);
            Ok(())
        }
    }
}

async fn login(controller: &SessionController, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

    let user = controller.login(&LoginCredentials::new(email, password)).await?;
    remember_email(config, &user.email);
    println!("Logged in as {}", user.display_name());
    Ok(())
}

fn require_session(controller: &SessionController) -> Result<()> {
    if !controller.is_logged_in() {
        bail!("Not logged in. Run `livefeed login` first.");
    }
    Ok(())
}

/// Persist the email for the next login prompt. Only `last_email` is
/// written so command-line and environment overrides stay out of the file.
fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());

    let result = Config::config_path().and_then(|path| {
        let mut stored = Config::load_from(&path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(&path)
    });
    if let Err(e) = result {
        warn!(error = %e, "Failed to save config");
    }
}

fn print_posts(posts: &[Post]) {
    if posts.is_empty() {
        println!("No posts.");
        return;
    }
    for post in posts {
        println!(
            "[{}] @{} ({})",
            post.id,
            post.username,
            post.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!("    {}", post.content);
    }
}
