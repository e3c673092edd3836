mod command;
pub mod render;

use std::sync::Arc;

use command::Command;
use teloxide::{
  Bot,
  dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{ChatId, Message, ParseMode, Update},
};

use crate::{
  prelude::*,
  registry::{Application, Release},
  state::AppState,
};

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    run_bot(app).await;
    Ok(())
  }
}

pub async fn run_bot(app: Arc<AppState>) {
  info!("Starting Telegram bot...");

  let bot = app.bot.clone();

  let handler = teloxide::dptree::entry().branch(
    Update::filter_message().filter_command::<Command>().endpoint({
      let app = app.clone();
      move |bot: Bot, msg: Message, cmd: Command| {
        let app = app.clone();
        let user_id =
          msg.from.as_ref().map_or(msg.chat.id.0, |user| user.id.0 as i64);
        let private = msg.chat.is_private();
        let bot = ReplyBot::new(bot, user_id, msg.chat.id, private);
        command::handle(app, bot, cmd)
      }
    }),
  );

  Dispatcher::builder(bot, handler).build().dispatch().await;
}

/// Posts a release announcement to the application's channel, if any.
pub async fn announce(
  app: &AppState,
  application: &Application,
  release: &Release,
) {
  let Some(channel) = application.channel() else {
    return;
  };

  let text =
    render::release_info(&application.info(), release, &app.config.host_name);
  if let Err(err) = app
    .bot
    .send_message(ChatId(channel), text)
    .parse_mode(ParseMode::Html)
    .await
  {
    warn!(
      "Failed to announce {} of #{} in {channel}: {err}",
      release.version,
      application.id()
    );
  }
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  pub user_id: i64,
  pub chat_id: ChatId,
  pub private: bool,
}

impl ReplyBot {
  pub fn new(inner: Bot, user_id: i64, chat_id: ChatId, private: bool) -> Self {
    Self { inner, user_id, chat_id, private }
  }

  async fn reply_html(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .await
  }

  /// Sends a potentially long message split at line boundaries.
  async fn reply_html_chunked(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<()> {
    for chunk in utils::chunk_message(&text.into(), 0) {
      self.reply_html(chunk).await?;
    }
    Ok(())
  }
}
