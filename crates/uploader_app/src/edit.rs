//! Archive edit commands: metadata, plugins, tag suggestions, deletion.

use std::io::Write;

use anyhow::bail;
use tokio::runtime::Runtime;
use uploader_core::edit::{
    metadata_save_failed, metadata_saved, plugin_failed, tag_suggestions, MetadataDraft,
    PluginResult, TagStat,
};
use uploader_core::Notification;
use uploader_engine::ArchiveApi;
use uploader_logging::uploader_info;

use crate::render::Renderer;

pub struct EditSession<'a, W: Write> {
    api: &'a dyn ArchiveApi,
    runtime: Runtime,
    renderer: &'a mut Renderer<W>,
}

impl<'a, W: Write> EditSession<'a, W> {
    pub fn new(api: &'a dyn ArchiveApi, renderer: &'a mut Renderer<W>) -> anyhow::Result<Self> {
        Ok(Self {
            api,
            runtime: Runtime::new()?,
            renderer,
        })
    }

    /// Saves title and tags. Returns whether the save succeeded.
    pub fn save_metadata(&mut self, archive_id: &str, draft: &MetadataDraft) -> anyhow::Result<bool> {
        let tags = draft.tags_field();
        let result = self
            .runtime
            .block_on(self.api.update_metadata(archive_id, &draft.title, &tags));
        let (saved, notification) = match result {
            Ok(()) => (true, metadata_saved()),
            Err(err) => (false, metadata_save_failed(err.to_string())),
        };
        self.renderer.notify(&notification)?;
        Ok(saved)
    }

    /// Saves the current metadata, runs the plugin and merges what it found.
    ///
    /// With `save` the merged draft is written back.
    pub fn run_plugin(
        &mut self,
        archive_id: &str,
        mut draft: MetadataDraft,
        plugin: &str,
        arg: Option<&str>,
        save: bool,
    ) -> anyhow::Result<MetadataDraft> {
        if !self.save_metadata(archive_id, &draft)? {
            bail!("metadata for {archive_id} could not be saved; plugin not run");
        }

        let data = match self
            .runtime
            .block_on(self.api.use_plugin(plugin, archive_id, arg))
        {
            Ok(data) => data,
            Err(err) => {
                self.renderer.notify(&plugin_failed(err.to_string()))?;
                bail!("plugin {plugin} failed for {archive_id}");
            }
        };
        uploader_info!("Plugin {} returned {:?}", plugin, data);

        let notifications = draft.apply_plugin(PluginResult {
            title: data.title,
            new_tags: data.new_tags,
        });
        self.notify_all(&notifications)?;
        self.renderer.notify(&Notification::info(
            "Metadata:",
            Some(format!("{} | {}", draft.title, draft.tags_field())),
        ))?;

        if save && !self.save_metadata(archive_id, &draft)? {
            bail!("merged metadata for {archive_id} could not be saved");
        }
        Ok(draft)
    }

    pub fn suggestions(&mut self, min_weight: u32) -> anyhow::Result<Vec<String>> {
        let stats = self.runtime.block_on(self.api.tag_stats(min_weight))?;
        let stats: Vec<TagStat> = stats
            .into_iter()
            .map(|stat| TagStat {
                namespace: stat.namespace,
                text: stat.text,
                weight: stat.weight,
            })
            .collect();
        Ok(tag_suggestions(&stats))
    }

    pub fn delete(&mut self, archive_id: &str, confirmed: bool) -> anyhow::Result<()> {
        if !confirmed {
            bail!("refusing to delete {archive_id} without --yes");
        }
        match self.runtime.block_on(self.api.delete_archive(archive_id)) {
            Ok(()) => {
                self.renderer.notify(&Notification::success(
                    format!("Archive {archive_id} deleted"),
                    None,
                ))?;
                Ok(())
            }
            Err(err) => {
                self.renderer.notify(&Notification::error(
                    format!("Error while deleting {archive_id}"),
                    err.to_string(),
                ))?;
                bail!("delete failed: {err}");
            }
        }
    }

    fn notify_all(&mut self, notifications: &[Notification]) -> std::io::Result<()> {
        notifications
            .iter()
            .try_for_each(|notification| self.renderer.notify(notification))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uploader_engine::{ApiSettings, ReqwestArchiveApi};
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Mock server living on its own runtime so the session can block.
    fn start_server(mount: impl FnOnce(&MockServer) -> Vec<Mock>) -> (Runtime, MockServer) {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        for mock in mount(&server) {
            rt.block_on(mock.mount(&server));
        }
        (rt, server)
    }

    fn api_for(server: &MockServer) -> ReqwestArchiveApi {
        ReqwestArchiveApi::new(ApiSettings {
            base_url: server.uri(),
            ..ApiSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn run_plugin_saves_then_merges_and_saves_again() {
        let (rt, server) = start_server(|_| {
            vec![
                Mock::given(method("PUT"))
                    .and(path("/api/archives/abc/metadata"))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 1})))
                    .expect(2),
                Mock::given(method("POST"))
                    .and(path("/api/plugins/use"))
                    .and(query_param("plugin", "copytags"))
                    .and(query_param("arg", "https://example.com/g/1"))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                        "success": 1,
                        "data": {"title": "Found title", "new_tags": "artist:foo, lang:en"}
                    }))),
            ]
        });

        let api = api_for(&server);
        let mut renderer = Renderer::new(Vec::new());
        let mut session = EditSession::new(&api, &mut renderer).unwrap();
        let draft = session
            .run_plugin(
                "abc",
                MetadataDraft::new("Old", "artist:foo"),
                "copytags",
                Some("https://example.com/g/1"),
                true,
            )
            .unwrap();
        drop(session);

        assert_eq!(draft.title, "Found title");
        assert_eq!(draft.tags_field(), "artist:foo, lang:en");
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("Added the following tags: artist:foo, lang:en"));
        rt.block_on(server.verify());
    }

    #[test]
    fn failed_save_stops_before_plugin() {
        let (rt, server) = start_server(|_| {
            vec![
                Mock::given(method("PUT"))
                    .and(path("/api/archives/abc/metadata"))
                    .and(body_string_contains("title=T"))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                        "success": 0,
                        "error": "Archive is locked"
                    }))),
                Mock::given(method("POST"))
                    .and(path("/api/plugins/use"))
                    .respond_with(ResponseTemplate::new(200))
                    .expect(0),
            ]
        });

        let api = api_for(&server);
        let mut renderer = Renderer::new(Vec::new());
        let mut session = EditSession::new(&api, &mut renderer).unwrap();
        let result = session.run_plugin("abc", MetadataDraft::new("T", ""), "p", None, false);
        drop(session);

        assert!(result.is_err());
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("error: Error while saving archive data: Archive is locked"));
        rt.block_on(server.verify());
    }

    #[test]
    fn suggestions_and_unconfirmed_delete() {
        let (_rt, server) = start_server(|_| {
            vec![Mock::given(method("GET"))
                .and(path("/api/database/stats"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"namespace": "artist", "text": "foo", "weight": 3},
                    {"namespace": "", "text": "colour", "weight": 2}
                ])))]
        });

        let api = api_for(&server);
        let mut renderer = Renderer::new(Vec::new());
        let mut session = EditSession::new(&api, &mut renderer).unwrap();
        assert_eq!(
            session.suggestions(2).unwrap(),
            vec!["artist:foo".to_string(), "colour".to_string()]
        );
        assert!(session.delete("abc", false).is_err());
    }
}
