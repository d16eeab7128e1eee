//! Outbound message rendering.
//!
//! Pure functions from source data to [`MessageContent`]. Edits are built
//! from the embed currently shown, so anything a moderator changed by hand
//! outside the touched fields survives.

use herald_core::content::{Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedMedia, MessageContent};
use herald_core::model::{Message, StreamStatus, SubjectProfile};

/// Side colour of the pinned summary.
pub const STARBOARD_COLOR: u32 = 0xFF_8F00;
/// Side colour of the reply-to embed.
pub const REPLY_COLOR: u32 = 0x2B_2D31;
/// Side colour of live announcements.
pub const LIVE_COLOR: u32 = 0x65_1FFF;

const GAME_FIELD: &str = "Game";
const VIEWERS_FIELD: &str = "Viewers";
const VOD_FIELD: &str = "VOD";

/// Visible count line of a pin.
#[must_use]
pub fn starboard_count(count: usize) -> String {
    format!("⭐ {count}")
}

/// Count-only edit of an existing pin.
#[must_use]
pub fn starboard_count_edit(count: usize) -> MessageContent {
    MessageContent::text(starboard_count(count))
}

/// Jump URL of a message.
#[must_use]
pub fn message_url(guild_id: &str, channel_id: &str, message_id: &str) -> String {
    format!("https://discord.com/channels/{guild_id}/{channel_id}/{message_id}")
}

/// Full pinned summary of `message`.
#[must_use]
pub fn starboard_pin(message: &Message, channel_name: &str, count: usize, guild_id: &str) -> MessageContent {
    let mut embeds = Vec::with_capacity(3);

    if let Some(reply) = &message.referenced {
        embeds.push(Embed {
            author: Some(EmbedAuthor {
                name: format!("Replying to {}", reply.author.display_name),
                icon_url: reply.author.avatar_url.clone(),
                url: None,
            }),
            description: non_empty(&reply.content),
            image: reply.attachments.first().map(media),
            color: Some(REPLY_COLOR),
            ..Embed::default()
        });
    }

    embeds.push(Embed {
        author: Some(EmbedAuthor {
            name: message.author.display_name.clone(),
            icon_url: message.author.avatar_url.clone(),
            url: None,
        }),
        description: non_empty(&message.content),
        image: message.attachments.first().map(media),
        color: Some(STARBOARD_COLOR),
        footer: Some(EmbedFooter {
            text: format!("{} • #{channel_name}", message.id),
        }),
        timestamp: Some(message.timestamp),
        ..Embed::default()
    });

    embeds.extend(message.embeds.first().cloned());

    MessageContent {
        text: Some(starboard_count(count)),
        embeds: Some(embeds),
        buttons: Vec::new(),
    }
    .with_button("Go to message", message_url(guild_id, &message.channel_id, &message.id))
}

/// Announcement of a stream that just went live.
#[must_use]
pub fn live_announcement(
    stream: &StreamStatus,
    profile: Option<&SubjectProfile>,
    box_art: Option<&str>,
    mentions: &[String],
) -> MessageContent {
    let embed = Embed {
        author: Some(EmbedAuthor {
            name: format!("{} is live", stream.user_name),
            icon_url: profile.and_then(|p| p.avatar_url.clone()),
            url: None,
        }),
        title: non_empty(&stream.title),
        url: Some(format!("https://twitch.tv/{}", stream.user_login)),
        color: Some(LIVE_COLOR),
        fields: vec![
            EmbedField::inline(GAME_FIELD, stream.game_name.clone()),
            EmbedField::inline(VIEWERS_FIELD, stream.viewer_count.to_string()),
        ],
        image: Some(EmbedMedia {
            url: thumbnail(&stream.thumbnail_url),
        }),
        thumbnail: box_art.map(media),
        timestamp: Some(stream.started_at),
        ..Embed::default()
    };

    let mut content = MessageContent::embeds(vec![embed]);
    if !mentions.is_empty() {
        content.text = Some(mentions.join(" "));
    }
    content
}

/// In-place refresh of a live announcement.
#[must_use]
pub fn refresh_embed(mut embed: Embed, stream: &StreamStatus) -> Embed {
    let viewers = stream.viewer_count.to_string();
    match embed.fields.iter_mut().find(|field| field.name == VIEWERS_FIELD) {
        Some(field) => field.value = viewers,
        None => embed.fields.push(EmbedField::inline(VIEWERS_FIELD, viewers)),
    }
    embed.image = Some(EmbedMedia {
        url: thumbnail(&stream.thumbnail_url),
    });
    embed
}

/// Terminal edit of an announcement whose stream ended.
#[must_use]
pub fn offline_embed(mut embed: Embed, subject: &str, vod_id: &str) -> Embed {
    let vod = format!("https://twitch.tv/videos/{vod_id}");
    let name = embed
        .author
        .as_ref()
        .and_then(|author| author.name.strip_suffix(" is live"))
        .map_or_else(|| subject.to_string(), ToString::to_string);

    let game = embed
        .fields
        .iter()
        .find(|field| field.name == GAME_FIELD)
        .filter(|field| !field.value.is_empty())
        .cloned();

    embed.author = Some(EmbedAuthor {
        name: format!("{name} was live"),
        icon_url: embed.author.and_then(|author| author.icon_url),
        url: None,
    });
    embed.fields = game.into_iter().collect();
    embed
        .fields
        .push(EmbedField::inline(VOD_FIELD, format!("[Link]({vod})")));
    embed.url = Some(vod);
    embed.image = None;
    embed
}

fn thumbnail(template: &str) -> String {
    template.replace("-{width}x{height}", "")
}

fn media(url: impl AsRef<str>) -> EmbedMedia {
    EmbedMedia {
        url: url.as_ref().to_string(),
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use herald_testing::fixtures;

    #[test]
    fn pin_carries_count_embeds_and_jump_button() {
        let mut message = fixtures::message("10", "42", "7", "look at this");
        message.attachments.push("https://cdn.example/cat.png".into());
        message.embeds.push(Embed {
            title: Some("link preview".into()),
            ..Embed::default()
        });

        let pin = starboard_pin(&message, "general", 3, "g1");

        assert_eq!(pin.text.as_deref(), Some("⭐ 3"));
        let embeds = pin.embeds.unwrap();
        assert_eq!(embeds.len(), 2);
        assert_eq!(embeds[0].color, Some(STARBOARD_COLOR));
        assert_eq!(embeds[0].description.as_deref(), Some("look at this"));
        assert_eq!(embeds[0].image.as_ref().unwrap().url, "https://cdn.example/cat.png");
        assert_eq!(embeds[0].footer.as_ref().unwrap().text, "42 • #general");
        assert_eq!(embeds[1].title.as_deref(), Some("link preview"));
        assert_eq!(pin.buttons[0].label, "Go to message");
        assert_eq!(pin.buttons[0].url, "https://discord.com/channels/g1/10/42");
    }

    #[test]
    fn replies_get_a_leading_embed() {
        let mut message = fixtures::message("10", "42", "7", "");
        message.referenced = Some(Box::new(fixtures::message("10", "41", "8", "original")));

        let embeds = starboard_pin(&message, "general", 1, "g1").embeds.unwrap();

        assert_eq!(embeds[0].color, Some(REPLY_COLOR));
        assert_eq!(embeds[0].author.as_ref().unwrap().name, "Replying to user-8");
        assert_eq!(embeds[0].description.as_deref(), Some("original"));
        assert!(embeds[1].description.is_none());
    }

    #[test]
    fn announcement_strips_the_thumbnail_template() {
        let stream = fixtures::stream("nyx", 12);
        let content = live_announcement(&stream, None, Some("https://art/509658.jpg"), &["<@&9>".into()]);
        let embed = &content.embeds.as_ref().unwrap()[0];

        assert_eq!(content.text.as_deref(), Some("<@&9>"));
        assert_eq!(embed.author.as_ref().unwrap().name, "Nyx is live");
        assert_eq!(
            embed.image.as_ref().unwrap().url,
            "https://static-cdn.jtvnw.net/previews-ttv/live_user_nyx.jpg"
        );
        assert_eq!(embed.thumbnail.as_ref().unwrap().url, "https://art/509658.jpg");
        assert_eq!(embed.fields[1].value, "12");
        assert_eq!(embed.url.as_deref(), Some("https://twitch.tv/nyx"));
    }

    #[test]
    fn refresh_only_touches_viewers_and_image() {
        let stream = fixtures::stream("nyx", 12);
        let embed = live_announcement(&stream, None, None, &[]).embeds.unwrap().remove(0);

        let refreshed = refresh_embed(embed.clone(), &fixtures::stream("nyx", 80));

        assert_eq!(refreshed.fields[1].value, "80");
        assert_eq!(refreshed.fields[0], embed.fields[0]);
        assert_eq!(refreshed.title, embed.title);
    }

    #[test]
    fn offline_embed_links_the_vod() {
        let stream = fixtures::stream("nyx", 12);
        let profile = SubjectProfile {
            login: "nyx".into(),
            display_name: "Nyx".into(),
            avatar_url: Some("https://cdn/nyx.png".into()),
        };
        let embed = live_announcement(&stream, Some(&profile), None, &[]).embeds.unwrap().remove(0);

        let done = offline_embed(embed, "nyx", "nyx-vod");

        let author = done.author.unwrap();
        assert_eq!(author.name, "Nyx was live");
        assert_eq!(author.icon_url.as_deref(), Some("https://cdn/nyx.png"));
        assert_eq!(done.fields.len(), 2);
        assert_eq!(done.fields[0].value, "Just Chatting");
        assert_eq!(done.fields[1].value, "[Link](https://twitch.tv/videos/nyx-vod)");
        assert_eq!(done.url.as_deref(), Some("https://twitch.tv/videos/nyx-vod"));
        assert!(done.image.is_none());
    }

    #[test]
    fn offline_embed_without_game_keeps_only_the_vod() {
        let done = offline_embed(Embed::default(), "nyx", "1");
        assert_eq!(done.author.unwrap().name, "nyx was live");
        assert_eq!(done.fields.len(), 1);
    }
}
