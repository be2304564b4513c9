//! Session, login and logout.

use anyhow::Result;
use serde_json::json;

use super::LoginArgs;
use crate::context::Context;

pub async fn show(ctx: &Context) -> Result<()> {
    let session = ctx.market.session();
    let spinner = ctx.output.spinner("Checking session...");
    let authenticated = session.fetch_session(true).await;
    spinner.finish_and_clear();

    let state = session.state();
    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "authenticated": authenticated,
            "userId": session.user_id(),
            "role": session.role(),
            "error": state.error,
        }));
        return Ok(());
    }

    ctx.output.header("Session");
    ctx.output.kv("api", &ctx.config.api.base_url);
    if !authenticated {
        ctx.output.kv("status", "signed out");
        if let Some(error) = state.error {
            ctx.output.debug(&error);
        }
        return Ok(());
    }
    ctx.output.kv("status", "signed in");
    if let Some(user) = session.user_id() {
        ctx.output.kv("user", user.as_str());
    }
    if let Some(role) = session.role() {
        ctx.output.kv("role", role.as_str());
    }
    Ok(())
}

pub async fn login(args: LoginArgs, ctx: &Context) -> Result<()> {
    ctx.login(args.email).await?;
    let role = ctx
        .market
        .session()
        .role()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "user".to_string());
    ctx.output.success(&format!("Signed in as {role}"));
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.market.sign_out().await;
    ctx.output.success("Signed out");
    Ok(())
}
