use anyhow::{anyhow, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use serde_json::json;
use uuid::Uuid;

use worker_domain::ports::BadgePublisher;
use worker_domain::{canonical_string, NewAward, ObjectStoreConfig, AWARD_ISSUER};

const CONTENT_TYPE: &str = "image/svg+xml";
const CACHE_CONTROL: &str = "public, max-age=31536000";

struct TierPalette {
    background: &'static str,
    band: &'static str,
    accent: &'static str,
    text: &'static str,
}

/// Unknown tiers fall back to a neutral palette; the tier label is free
/// text and only ever affects colors.
fn palette_for(tier: &str) -> TierPalette {
    match tier.to_ascii_lowercase().as_str() {
        "bronze" => TierPalette {
            background: "#2b1d12",
            band: "#8c5a2b",
            accent: "#cd7f32",
            text: "#f5e9dc",
        },
        "silver" => TierPalette {
            background: "#1c1f24",
            band: "#6e7681",
            accent: "#c0c0c0",
            text: "#f3f5f7",
        },
        "gold" => TierPalette {
            background: "#231a05",
            band: "#9c7a1c",
            accent: "#ffd700",
            text: "#fdf6e0",
        },
        "platinum" => TierPalette {
            background: "#101820",
            band: "#4f6d7a",
            accent: "#e5e4e2",
            text: "#eef3f6",
        },
        "legendary" => TierPalette {
            background: "#190a24",
            band: "#6b21a8",
            accent: "#c084fc",
            text: "#f4ebfd",
        },
        _ => TierPalette {
            background: "#15181d",
            band: "#3d434c",
            accent: "#9aa4b2",
            text: "#e9edf2",
        },
    }
}

/// Escapes every character that could break out of an SVG text node or
/// attribute. A malicious award title stays inert markup.
pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

pub fn badge_object_key(player_id: &str, award_id: Uuid) -> String {
    format!("badges/{}/{}.svg", player_id, award_id)
}

/// Renders the badge body. A pure function of the award fields: the same
/// award always produces byte-identical SVG.
pub fn render_badge_svg(award_id: Uuid, award: &NewAward) -> String {
    let palette = palette_for(&award.tier);
    let title = xml_escape(&award.title);
    let tier = xml_escape(&award.tier);
    let issuer = xml_escape(&award.issuer);
    let date = award.awarded_at.format("%Y-%m-%d").to_string();
    let identity = json!({
        "award_id": award_id.to_string(),
        "player_id": award.player_id,
        "rule_id": award.rule_id,
        "scope_key": award.scope_key,
        "level": award.level,
    });
    let metadata = xml_escape(&canonical_string(&identity));

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="380" viewBox="0 0 600 380">
  <metadata>{metadata}</metadata>
  <rect width="600" height="380" rx="24" fill="{background}"/>
  <rect x="0" y="0" width="600" height="96" rx="24" fill="{band}"/>
  <rect x="0" y="48" width="600" height="48" fill="{band}"/>
  <circle cx="300" cy="170" r="56" fill="none" stroke="{accent}" stroke-width="6"/>
  <text x="300" y="60" text-anchor="middle" font-family="Georgia, serif" font-size="28" fill="{text}">{title}</text>
  <text x="300" y="182" text-anchor="middle" font-family="Georgia, serif" font-size="30" fill="{accent}">{tier}</text>
  <text x="300" y="292" text-anchor="middle" font-family="Georgia, serif" font-size="20" fill="{text}">{date}</text>
  <text x="300" y="338" text-anchor="middle" font-family="Georgia, serif" font-size="14" fill="{accent}">{issuer}</text>
</svg>
"##,
        metadata = metadata,
        background = palette.background,
        band = palette.band,
        accent = palette.accent,
        text = palette.text,
        title = title,
        tier = tier,
        date = date,
        issuer = issuer,
    )
}

/// Renders badges and pushes them to the S3-compatible blob sink. The
/// bucket is assumed to exist; the service never creates or lists.
pub struct BadgeService {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl BadgeService {
    pub fn new(config: &ObjectStoreConfig, public_base_url: &str) -> Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )?;
        let bucket = Bucket::new(&config.bucket, region, credentials)?.with_path_style();
        Ok(Self {
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BadgePublisher for BadgeService {
    async fn generate_and_upload(
        &self,
        award_id: Uuid,
        award: &NewAward,
    ) -> Result<String> {
        let key = badge_object_key(&award.player_id, award_id);
        let svg = render_badge_svg(award_id, award);

        // upload provenance lives in object metadata, never in the blob
        // body, so re-renders stay byte-identical
        let mut bucket = (*self.bucket).clone();
        bucket.add_header("cache-control", CACHE_CONTROL);
        bucket.add_header("x-amz-meta-generated-by", AWARD_ISSUER);
        bucket.add_header(
            "x-amz-meta-generated-at",
            &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );

        let response = bucket
            .put_object_with_content_type(&key, svg.as_bytes(), CONTENT_TYPE)
            .await?;
        if response.status_code() != 200 {
            return Err(anyhow!(
                "object store put {} responded {}",
                key,
                response.status_code()
            ));
        }

        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn award() -> NewAward {
        NewAward {
            player_id: "p1".to_string(),
            rule_id: 7,
            scope_key: Some("m1".to_string()),
            level: 1,
            title: "50 Bomb".to_string(),
            tier: "Gold".to_string(),
            match_id: Some("m1".to_string()),
            season_id: Some("s1".to_string()),
            league_id: None,
            game_year: None,
            awarded_at: Utc.with_ymd_and_hms(2025, 11, 2, 4, 30, 0).unwrap(),
            stats: serde_json::json!({}),
            issuer: AWARD_ISSUER.to_string(),
            version: 1,
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let award_id = Uuid::nil();
        let first = render_badge_svg(award_id, &award());
        let second = render_badge_svg(award_id, &award());
        assert_eq!(first, second);
    }

    #[test]
    fn badge_carries_title_tier_date_and_issuer() {
        let svg = render_badge_svg(Uuid::nil(), &award());
        assert!(svg.contains("50 Bomb"));
        assert!(svg.contains("Gold"));
        assert!(svg.contains("2025-11-02"));
        assert!(svg.contains("achievements-worker"));
    }

    #[test]
    fn metadata_block_is_canonical_json_of_identity() {
        let svg = render_badge_svg(Uuid::nil(), &award());
        let expected = xml_escape(&canonical_string(&serde_json::json!({
            "award_id": Uuid::nil().to_string(),
            "player_id": "p1",
            "rule_id": 7,
            "scope_key": "m1",
            "level": 1,
        })));
        assert!(svg.contains(&expected));
    }

    #[test]
    fn hostile_titles_cannot_escape_their_text_element() {
        let mut hostile = award();
        hostile.title = r#"</text><script>alert('x')</script> & "more""#.to_string();
        let svg = render_badge_svg(Uuid::nil(), &hostile);
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
        assert!(svg.contains("&amp;"));
        assert!(svg.contains("&quot;more&quot;"));
        assert!(svg.contains("&apos;x&apos;"));
    }

    #[test]
    fn unknown_tier_gets_the_neutral_palette() {
        let mut unknown = award();
        unknown.tier = "Mythic".to_string();
        let svg = render_badge_svg(Uuid::nil(), &unknown);
        assert!(svg.contains("#15181d"));
    }

    #[test]
    fn object_keys_namespace_by_player() {
        let key = badge_object_key("p1", Uuid::nil());
        assert_eq!(key, "badges/p1/00000000-0000-0000-0000-000000000000.svg");
    }
}
