//! Command implementations. Results go to stdout, diagnostics to the log.

use std::sync::Arc;

use chrono::Utc;

use storefront_core::models::{NotificationEvent, NotificationId};
use storefront_core::notifications::{AlertGate, ReadFilter, TerminalBell};
use storefront_core::{
    ApiClient, ApiError, ClientConfig, NotificationCenter, NotificationFeed, SessionStore,
};
use tracing::info;

use crate::{Error, Result};

fn client(config: ClientConfig) -> ApiClient {
    let session = Arc::new(SessionStore::from_config(&config));
    ApiClient::new(config, session)
}

/// User id from the stored token, or `AuthRequired`.
fn signed_in_user(api: &ApiClient) -> Result<String> {
    api.session()
        .get_user_from_token()
        .and_then(|claims| claims.user_id)
        .ok_or(Error::Api(ApiError::AuthRequired))
}

pub async fn login(config: ClientConfig, phone: &str, password: &str) -> Result<()> {
    let api = client(config);
    let response = api.login(phone, password).await?;
    if !api.is_logged_in() {
        return Err(Error::Custom(
            response
                .message
                .unwrap_or_else(|| "Login failed: no token received".into()),
        ));
    }
    println!("{}", response.message.as_deref().unwrap_or("Signed in"));
    Ok(())
}

pub fn logout(config: ClientConfig) {
    client(config).logout();
    println!("Signed out");
}

pub fn whoami(config: ClientConfig) -> Result<()> {
    let api = client(config);
    match api.session().get_user_from_token() {
        Some(claims) => {
            if claims.is_expired(Utc::now()) {
                info!("stored token has expired");
            }
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        None => println!("{}", storefront_core::session::GUEST),
    }
    Ok(())
}

pub async fn profile(config: ClientConfig, sync: bool) -> Result<()> {
    let api = client(config);
    let profile = if sync {
        Some(api.sync_profile().await?)
    } else {
        api.session().get_saved_user()
    };
    match profile {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("No cached profile"),
    }
    Ok(())
}

pub async fn list_notifications(
    config: ClientConfig,
    admin: bool,
    filter: ReadFilter,
) -> Result<()> {
    let api = client(config);
    let list = if admin {
        api.fetch_admin().await?
    } else {
        let user_id = signed_in_user(&api)?;
        api.fetch_initial(&user_id).await?
    };
    for event in list.filter(filter) {
        println!("{}", format_event(event));
    }
    println!("{} unread of {}", list.unread_count(), list.len());
    Ok(())
}

pub async fn read_notification(config: ClientConfig, id: &str) -> Result<()> {
    let api = client(config);
    let user_id = signed_in_user(&api)?;
    let list = api.fetch_initial(&user_id).await?;
    let feed = NotificationFeed::new(list, Arc::new(api.clone()));

    feed.mark_as_read(&NotificationId::from(id)).await?;
    println!("Marked {id} as read ({} unread)", feed.unread_count());
    Ok(())
}

pub async fn watch(config: ClientConfig, bell: bool) -> Result<()> {
    let api = client(config);
    let alert = if bell {
        AlertGate::new(TerminalBell)
    } else {
        AlertGate::silent()
    };
    let center = NotificationCenter::new(api, alert);
    let mut subscription = center.open_for_session()?;
    info!("watching notifications, press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = subscription.next_event() => match event {
                Some(event) => println!("{}", format_event(&event)),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    subscription.close();
    println!("{} unread of {}", center.unread_count(), center.notifications().len());
    Ok(())
}

/// One line per notification: marker, time, id, message and order code.
fn format_event(event: &NotificationEvent) -> String {
    let marker = if event.read { ' ' } else { '*' };
    let mut line = format!(
        "{marker} {} [{}] {}",
        event.created_at.format("%Y-%m-%d %H:%M"),
        event.id,
        event.message
    );
    if let Some(code) = event
        .order_reference
        .as_ref()
        .and_then(|order| order.order_code.as_deref())
    {
        line.push_str(&format!(" ({code})"));
    }
    line
}
