//! HTML presentation of registry snapshots.

use crate::{
  prelude::*,
  registry::{ApplicationInfo, Release},
  report::{PluginReport, PluginStatus, ServerMetaData},
};

pub fn mention(user: i64) -> String {
  format!("<a href=\"tg://user?id={user}\">{user}</a>")
}

pub fn owners(owners: &[i64]) -> String {
  if owners.is_empty() {
    return "<i>none</i>".into();
  }
  owners.iter().map(|&id| mention(id)).collect::<Vec<_>>().join(", ")
}

fn stability(release: &Release) -> &'static str {
  if release.dev_build { "dev" } else { "stable" }
}

pub fn application_info(
  info: &ApplicationInfo,
  latest: Option<&Release>,
  host: &str,
) -> String {
  let mut text = format!(
    "📦 <b>#{} {}</b>\n{}\n\n<b>Identifier:</b> <code>{}</code>\n\
     <b>Owner:</b> {}\n",
    info.id,
    utils::escape(&info.display_name),
    utils::escape(&info.description),
    utils::escape(&info.identifier),
    owners(&info.owner),
  );

  if !info.alias.is_empty() {
    text.push_str(&format!(
      "<b>Alias:</b> {}\n",
      utils::escape(&info.alias.join(", "))
    ));
  }

  match latest {
    Some(release) => text.push_str(&format!(
      "\n<b>Latest Version:</b> {} ({})\n\
       <b>Download:</b> {}\n\
       <b>Checksum Sha256:</b> <code>{}</code>\n\
       <b>Published:</b> {}",
      utils::escape(&release.version),
      stability(release),
      utils::escape(&utils::download_url(host, info.id, &release.version)),
      release.checksum,
      utils::format_date(release.published),
    )),
    None => text.push_str("\n<i>No releases yet</i>"),
  }

  text
}

pub fn release_info(
  info: &ApplicationInfo,
  release: &Release,
  host: &str,
) -> String {
  format!(
    "🚀 <b>#{} {} {}</b>\n{}\n\n\
     <b>Patchnotes</b>\n{}\n\n\
     <b>Stable:</b> {}\n\
     <b>Download:</b> {}\n\
     <b>Checksum Sha256:</b> <code>{}</code>\n\
     <b>Published:</b> {}",
    info.id,
    utils::escape(&info.display_name),
    utils::escape(&release.version),
    utils::escape(&release.title),
    utils::escape(&release.patchnotes),
    stability(release),
    utils::escape(&utils::download_url(host, info.id, &release.version)),
    release.checksum,
    utils::format_date(release.published),
  )
}

pub fn release_list(info: &ApplicationInfo, releases: &[Release]) -> String {
  let mut text = format!(
    "<b>Releases of #{} {}</b>\n",
    info.id,
    utils::escape(&info.display_name)
  );

  if releases.is_empty() {
    text.push_str("\n<i>No releases</i>");
  }
  for release in releases {
    text.push_str(&format!(
      "\n{} <b>{}</b> {}\n{}\n",
      if release.dev_build { "🧪" } else { "✅" },
      utils::escape(&release.version),
      utils::escape(&release.title),
      utils::format_date(release.published),
    ));
  }

  text
}

pub fn application_line(
  info: &ApplicationInfo,
  latest: Option<&Release>,
) -> String {
  format!(
    "<b>#{}</b> {} (<code>{}</code>) {}",
    info.id,
    utils::escape(&info.display_name),
    utils::escape(&info.identifier),
    latest.map_or_else(
      || "<i>unreleased</i>".to_string(),
      |r| utils::escape(&r.version)
    ),
  )
}

pub fn report(meta: &ServerMetaData, plugins: &[PluginReport]) -> String {
  let mut text = format!(
    "🖥 <b>Server Report</b>\n<pre>{}</pre>\n",
    utils::escape(&meta.to_string())
  );

  for plugin in plugins {
    let line = match &plugin.status {
      PluginStatus::Current { application } => {
        format!("✅ {} {} (#{application})", plugin.name, plugin.installed)
      }
      PluginStatus::Outdated { application, latest } => format!(
        "⚠️ {} {} (#{application}, latest {latest})",
        plugin.name, plugin.installed
      ),
      PluginStatus::Unreleased { application } => {
        format!(
          "⚪ {} {} (#{application}, no releases)",
          plugin.name, plugin.installed
        )
      }
      PluginStatus::Unknown => {
        format!("❔ {} {}", plugin.name, plugin.installed)
      }
    };
    text.push('\n');
    text.push_str(&utils::escape(&line));
  }

  text
}
