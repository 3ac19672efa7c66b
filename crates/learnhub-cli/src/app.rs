//! Command execution for the learnhub CLI.
//!
//! `App` owns the configuration, the session manager, and a navigator. Every
//! command restores the stored session first, then runs through the same
//! route gate the views use.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use learnhub_core::auth::MemoryCredentialStore;
use learnhub_core::config::{ENV_EMAIL, ENV_PASSWORD};
use learnhub_core::{
    Config, CredentialStore, Endpoint, GateDecision, Navigator, Route, SessionManager, ViewScope,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::render;
use crate::Command;

pub struct App {
    config: Config,
    manager: SessionManager,
    navigator: Navigator,
}

impl App {
    pub fn new(ephemeral: bool) -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let store: Arc<dyn CredentialStore> = if ephemeral {
            Arc::new(MemoryCredentialStore::new())
        } else {
            config.credential_store()?
        };
        let manager = SessionManager::from_config(&config, store)?;
        let navigator = Navigator::new(manager.session());
        debug!(base_url = %config.base_url, ephemeral, "App initialized");

        Ok(Self {
            config,
            manager,
            navigator,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let status = self.manager.restore().await;
        debug!(?status, "Session restored");

        match command {
            Command::Login { email } => self.login(email).await,
            Command::Register => self.register().await,
            Command::Logout => self.logout(),
            Command::Whoami => self.whoami(),
            Command::Dashboard => self.open(Route::Home).await,
            Command::Open { path } => self.open(Route::parse(&path)).await,
            Command::Watch => self.watch().await,
            Command::Help => Ok(()),
        }
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let decision = self.navigator.navigate(Route::Login);
        if decision == GateDecision::RedirectToHome {
            if let Some(profile) = self.manager.session().profile() {
                println!("Already logged in as {}.", profile.email);
            }
            return Ok(());
        }

        let email = match email.or_else(|| std::env::var(ENV_EMAIL).ok()) {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let password = match std::env::var(ENV_PASSWORD) {
            Ok(password) => password,
            Err(_) => rpassword::prompt_password("Password: ")?,
        };
        if email.is_empty() || password.is_empty() {
            bail!("Email and password required");
        }

        println!("Authenticating...");
        let profile = self.manager.login(&email, &password).await?;

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("{}", render::greeting(&profile));
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let decision = self.navigator.navigate(Route::Register);
        if decision == GateDecision::RedirectToHome {
            println!("{}", render::redirect(decision));
            return Ok(());
        }

        let name = prompt("Name: ")?;
        let email = prompt("Email: ")?;
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        let message = self.manager.register(&name, &email, &password).await?;
        info!(email, "Registered");
        println!("{}", message);
        println!("You can now run `learnhub login {}`.", email);
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        if self.manager.logout() {
            println!("Logged out.");
        } else {
            println!("Not logged in.");
        }
        Ok(())
    }

    fn whoami(&mut self) -> Result<()> {
        match self.manager.session().profile() {
            Some(profile) => println!("{}", render::profile(&profile)),
            None => println!("Not logged in."),
        }
        Ok(())
    }

    /// Render one view, the way the web client would after a navigation.
    async fn open(&mut self, route: Route) -> Result<()> {
        let decision = self.navigator.navigate(route);
        if !decision.renders() {
            println!("{}", render::redirect(decision));
            return Ok(());
        }
        self.render_route(self.navigator.current()).await
    }

    async fn render_route(&self, route: Route) -> Result<()> {
        let resources = self.manager.resources();
        let scope = ViewScope::open(self.manager.session());

        let output = match route {
            Route::Home => scope
                .guard(resources.load_dashboard())
                .await
                .transpose()?
                .map(|d| render::dashboard(&d)),
            Route::Courses => scope
                .guard(resources.courses())
                .await
                .transpose()?
                .map(|c| render::courses(&c)),
            Route::CourseDetails(id) => scope
                .guard(async {
                    futures::try_join!(resources.course(id), resources.course_modules(id))
                })
                .await
                .transpose()?
                .map(|(course, modules)| render::course_details(&course, &modules)),
            Route::Profile => self.manager.session().profile().map(|p| render::profile(&p)),
            Route::Notifications => scope
                .guard(resources.notifications(false))
                .await
                .transpose()?
                .map(|n| render::notifications(&n)),
            Route::Statistics => {
                if !self.role_allows_statistics() {
                    println!("Statistics are available to instructors and administrators.");
                    return Ok(());
                }
                scope
                    .guard(resources.call::<Value>(Endpoint::UserPerformance))
                    .await
                    .transpose()?
                    .map(|s| render::statistics(&s))
            }
            Route::NotFound => Some("Page not found.".to_string()),
            Route::Login | Route::Register => None,
        };

        match output {
            Some(text) => println!("{}", text),
            None => println!("{}", render::redirect(GateDecision::RedirectToLogin)),
        }
        Ok(())
    }

    fn role_allows_statistics(&self) -> bool {
        self.manager
            .session()
            .profile()
            .is_some_and(|p| p.role.can_view_statistics())
    }

    /// Follow the unread count until Ctrl-C or until the session ends.
    async fn watch(&mut self) -> Result<()> {
        let decision = self.navigator.navigate(Route::Notifications);
        if !decision.renders() {
            println!("{}", render::redirect(decision));
            return Ok(());
        }

        let poller = self.manager.poller().clone();
        let scope = ViewScope::open(self.manager.session());
        let stopper = poller.clone();
        scope.on_close(move || {
            stopper.stop();
        });

        // Restore already started the poller; start() is a no-op then
        poller.start();
        let mut counts = poller.subscribe();
        println!(
            "Watching notifications every {}s, Ctrl-C to stop.",
            poller.interval().as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
                changed = counts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = *counts.borrow_and_update();
                    println!("{}", render::unread_badge(count));
                }
                decision = self.navigator.next_change() => {
                    if decision != Some(GateDecision::RenderProtected) {
                        println!(
                            "Session ended. {}",
                            render::redirect(GateDecision::RedirectToLogin)
                        );
                        break;
                    }
                }
            }
        }

        drop(scope);
        debug!(ticks = poller.ticks(), "Stopped watching");
        Ok(())
    }

    fn prompt_email(&self) -> Result<String> {
        match self.config.last_email.as_deref() {
            Some(last) => {
                let input = prompt(&format!("Email [{}]: ", last))?;
                if input.is_empty() {
                    Ok(last.to_string())
                } else {
                    Ok(input)
                }
            }
            None => prompt("Email: "),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
