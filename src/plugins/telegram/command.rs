use std::{io::ErrorKind, path::Path, sync::Arc};

use teloxide::{
  prelude::*,
  utils::command::{BotCommands, ParseError},
};
use uuid::Uuid;

use super::{ReplyBot, render};
use crate::{
  prelude::*,
  registry::{Application, NewApplication},
  report,
  state::AppState,
};

fn parse_create(
  input: String,
) -> std::result::Result<(String, String), ParseError> {
  let (identifier, display_name) = split_first(&input);

  if identifier.is_empty() {
    return Err(ParseError::IncorrectFormat(
      "Usage: /create <identifier> [display name]".into(),
    ));
  }

  let display_name =
    if display_name.is_empty() { identifier } else { display_name };
  Ok((identifier.to_string(), display_name.to_string()))
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
  Start,
  Help,
  Apps,
  Mine,
  Info(String),
  Releases(String),
  Release(String),
  #[command(parse_with = parse_create)]
  Create {
    identifier: String,
    display_name: String,
  },
  Rename(String),
  DisplayName(String),
  Describe(String),
  Alias(String),
  Channel(String),
  Owner(String),
  Webhook(String),
  /// Removes a release and its artifact
  Yank(String),
  DeleteApp(String),
  Debug(String),
}

const HELP: &str = "\
<b>📦 Update Butler</b>

<b>Browse:</b>
/apps - List all applications
/mine - List applications you own
/info &lt;app&gt; - Show application details
/releases &lt;app&gt; [dev] - List stable (or all) releases
/release &lt;app&gt; &lt;version|latest&gt; - Show one release
/debug &lt;report id&gt; - Show a submitted server report

<b>Manage (owners):</b>
/rename &lt;app&gt; &lt;identifier&gt; - Change the identifier
/displayname &lt;app&gt; &lt;name&gt; - Change the display name
/describe &lt;app&gt; &lt;text&gt; - Change the description
/alias &lt;app&gt; add|remove|set &lt;names&gt; - Edit aliases
/channel &lt;app&gt; here|none|&lt;chat id&gt; - Announcement channel
/owner &lt;app&gt; add|remove &lt;user id&gt; - Edit owners
/webhook &lt;app&gt; - Show the publishing URL (private chat only)
/yank &lt;app&gt; &lt;version&gt; - Delete a release";

const ADMIN_HELP: &str = "

<b>Admin:</b>
/create &lt;identifier&gt; [display name] - Register an application
/deleteapp &lt;app&gt; - Delete an application and its releases";

/// Splits off the first whitespace separated word.
fn split_first(input: &str) -> (&str, &str) {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((first, rest)) => (first, rest.trim()),
    None => (input, ""),
  }
}

fn usage(text: &str) -> Error {
  Error::InvalidArgs(format!("Usage: {text}"))
}

/// Looks an application up by name, falling back to its numeric id.
fn find(app: &AppState, key: &str) -> Result<Arc<Application>> {
  let key = key.trim().trim_start_matches('#');
  match app.registry.resolve(key) {
    Err(Error::NotFound(missing)) => match key.parse() {
      Ok(id) => app.registry.by_id(id),
      Err(_) => Err(missing.into()),
    },
    other => other,
  }
}

/// Resolves `<app> ...` and checks that the caller may manage it.
fn managed<'a>(
  app: &AppState,
  bot: &ReplyBot,
  input: &'a str,
  help: &str,
) -> Result<(Arc<Application>, &'a str)> {
  let (key, rest) = split_first(input);
  if key.is_empty() {
    return Err(usage(help));
  }

  let application = find(app, key)?;
  app.authorize(&application, bot.user_id)?;
  Ok((application, rest))
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: Command,
) -> ResponseResult<()> {
  match execute(&app, &bot, cmd).await {
    Ok(text) => bot.reply_html_chunked(text).await?,
    Err(e) => {
      if e.status().is_server_error() {
        error!("Command of {} failed: {e}", bot.user_id);
      }
      bot
        .reply_html(format!("❌ {}", utils::escape(&e.user_message())))
        .await?;
    }
  }
  Ok(())
}

async fn execute(
  app: &AppState,
  bot: &ReplyBot,
  cmd: Command,
) -> Result<String> {
  let sv = app.sv();
  let host = &app.config.host_name;

  match cmd {
    Command::Start => Ok(format!(
      "<b>Update Butler</b>\n\n\
       I keep track of {} applications and their releases.\n\
       Use /help to see what I can do.",
      app.registry.len()
    )),

    Command::Help if app.is_admin(bot.user_id) => {
      Ok(format!("{HELP}{ADMIN_HELP}"))
    }
    Command::Help => Ok(HELP.into()),

    Command::Apps => Ok(list(&app.registry.all(), "Applications")),
    Command::Mine => {
      Ok(list(&app.registry.owned_by(bot.user_id), "Your Applications"))
    }

    Command::Info(input) => {
      if input.trim().is_empty() {
        return Err(usage("/info <app>"));
      }
      let application = find(app, &input)?;
      let shown = application.preferred_version();
      Ok(render::application_info(&application.info(), shown.as_ref(), host))
    }

    Command::Releases(input) => {
      let (key, flag) = split_first(&input);
      if key.is_empty() {
        return Err(usage("/releases <app> [dev]"));
      }
      let application = find(app, key)?;
      let dev = matches!(flag.to_lowercase().as_str(), "dev" | "all");
      let releases = application.releases(dev);
      Ok(render::release_list(&application.info(), &releases))
    }

    Command::Release(input) => {
      let (key, version) = split_first(&input);
      if key.is_empty() || version.is_empty() {
        return Err(usage("/release <app> <version|latest>"));
      }
      let application = find(app, key)?;
      let release = application.release(version)?;
      Ok(render::release_info(&application.info(), &release, host))
    }

    Command::Create { identifier, display_name } => {
      if !app.is_admin(bot.user_id) {
        return Err(Error::Forbidden);
      }

      let application = app.registry.create_next(NewApplication {
        id: 0,
        identifier,
        display_name,
        description: String::new(),
        alias: vec![],
        owner: bot.user_id,
        channel: (!bot.private).then_some(bot.chat_id.0),
      })?;
      sv.application.save(&application).await?;

      info!(
        "Application #{} {} created by {}",
        application.id(),
        application.identifier(),
        bot.user_id
      );
      Ok(format!(
        "✅ Application created\n\n{}\n\nUse /webhook {} in a private chat \
         to get the publishing URL.",
        render::application_info(&application.info(), None, host),
        application.id()
      ))
    }

    Command::Rename(input) => {
      let (application, identifier) =
        managed(app, bot, &input, "/rename <app> <identifier>")?;
      app.registry.rename(application.id(), identifier)?;
      sv.application.save(&application).await?;
      Ok(format!(
        "✅ Identifier is now <code>{}</code>",
        utils::escape(&application.identifier())
      ))
    }

    Command::DisplayName(input) => {
      let (application, name) =
        managed(app, bot, &input, "/displayname <app> <name>")?;
      if name.is_empty() {
        return Err(usage("/displayname <app> <name>"));
      }
      application.set_display_name(name);
      sv.application.save(&application).await?;
      Ok(format!("✅ Display name is now {}", utils::escape(name)))
    }

    Command::Describe(input) => {
      let (application, description) =
        managed(app, bot, &input, "/describe <app> <text>")?;
      application.set_description(description);
      sv.application.save(&application).await?;
      Ok("✅ Description updated".into())
    }

    Command::Alias(input) => {
      let help = "/alias <app> add|remove|set <names>";
      let (application, rest) = managed(app, bot, &input, help)?;
      let (action, names) = split_first(rest);
      let names: Vec<String> = names
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();

      let id = application.id();
      let mut changed = false;
      match action.to_lowercase().as_str() {
        "add" if !names.is_empty() => {
          for name in names {
            changed |= app.registry.add_alias(id, name)?;
          }
        }
        "remove" if !names.is_empty() => {
          for name in names {
            changed |= app.registry.remove_alias(id, &name)?;
          }
        }
        "set" => {
          app.registry.set_aliases(id, names)?;
          changed = true;
        }
        _ => return Err(usage(help)),
      }

      if changed {
        sv.application.save(&application).await?;
      }
      let alias = application.info().alias;
      Ok(if alias.is_empty() {
        "✅ No aliases".into()
      } else {
        format!("✅ Aliases: {}", utils::escape(&alias.join(", ")))
      })
    }

    Command::Channel(input) => {
      let help = "/channel <app> here|none|<chat id>";
      let (application, target) = managed(app, bot, &input, help)?;
      let channel = match target.to_lowercase().as_str() {
        "here" => Some(bot.chat_id.0),
        "none" | "off" => None,
        raw => Some(raw.parse::<i64>().map_err(|_| usage(help))?),
      };

      application.set_channel(channel);
      sv.application.save(&application).await?;
      Ok(match channel {
        Some(chat) => {
          format!("✅ Releases are announced in <code>{chat}</code>")
        }
        None => "✅ Announcements disabled".into(),
      })
    }

    Command::Owner(input) => {
      let help = "/owner <app> add|remove <user id>";
      let (application, rest) = managed(app, bot, &input, help)?;
      let (action, user) = split_first(rest);
      let user: i64 = user.parse().map_err(|_| usage(help))?;

      let changed = match action.to_lowercase().as_str() {
        "add" => application.add_owner(user),
        "remove" => application.remove_owner(user),
        _ => return Err(usage(help)),
      };

      if changed {
        sv.application.save(&application).await?;
      }
      Ok(format!("✅ Owners: {}", render::owners(&application.info().owner)))
    }

    Command::Webhook(input) => {
      let (application, _) = managed(app, bot, &input, "/webhook <app>")?;
      if !bot.private {
        return Err(Error::InvalidArgs(
          "The webhook is a secret, ask me in a private chat".into(),
        ));
      }
      Ok(format!(
        "🔑 Publishing URL of #{}:\n<code>{}/api/webhook/{}</code>",
        application.id(),
        utils::escape(host),
        application.webhook()
      ))
    }

    Command::Yank(input) => {
      let help = "/yank <app> <version>";
      let (application, version) = managed(app, bot, &input, help)?;
      if version.is_empty() {
        return Err(usage(help));
      }

      let release = application.release(version)?;
      application.delete_release(&release.version);
      sv.release.delete(application.id(), &release.version).await?;
      remove_dir(&app.release_dir(application.id(), &release.version)).await;

      info!(
        "Release {} of #{} yanked by {}",
        release.version,
        application.id(),
        bot.user_id
      );
      Ok(format!("✅ Release {} removed", utils::escape(&release.version)))
    }

    Command::DeleteApp(input) => {
      if !app.is_admin(bot.user_id) {
        return Err(Error::Forbidden);
      }
      if input.trim().is_empty() {
        return Err(usage("/deleteapp <app>"));
      }

      let id = find(app, &input)?.id();
      let application = app.registry.delete(id)?;
      sv.application.delete(id).await?;
      remove_dir(&app.config.releases_directory.join(id.to_string())).await;

      info!(
        "Application #{id} {} deleted by {}",
        application.identifier(),
        bot.user_id
      );
      Ok(format!(
        "🗑 Application {} deleted",
        utils::escape(&application.display_name())
      ))
    }

    Command::Debug(input) => {
      let id: Uuid = input
        .trim()
        .parse()
        .map_err(|_| usage("/debug <report id>"))?;
      let report = app
        .reports
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| Missing::Report(id.to_string()))?;

      let plugins = report::cross_reference(&app.registry, &report.meta);
      Ok(render::report(&report.meta, &plugins))
    }
  }
}

fn list(applications: &[Arc<Application>], title: &str) -> String {
  if applications.is_empty() {
    return format!("<b>{title}</b>\n\n<i>Nothing here yet</i>");
  }

  let mut text = format!("<b>{title} ({})</b>\n", applications.len());
  for application in applications {
    let shown = application.preferred_version();
    text.push('\n');
    text.push_str(&render::application_line(
      &application.info(),
      shown.as_ref(),
    ));
  }
  text
}

async fn remove_dir(path: &Path) {
  match tokio::fs::remove_dir_all(path).await {
    Ok(()) => debug!("Removed {}", path.display()),
    Err(err) if err.kind() == ErrorKind::NotFound => {}
    Err(err) => warn!("Failed to remove {}: {err}", path.display()),
  }
}
