//! Page resolver: turns a page URL into video metadata with playable formats

use crate::core::video_info::{Listing, VideoMetadata};
use crate::error::KvsError;
use crate::platform::client::PageFetcher;
use crate::platform::flashvars::extract_flashvars;
use crate::platform::formats::assemble_formats;
use crate::platform::listing::{collapse_doubled_title, listing_title, next_page_url, video_links};
use crate::platform::page::{
    check_access, embed_alt_url, extract_display_id, extract_title, extract_uploader,
};
use crate::utils::url::{classify_url, playlist_video_url, PageKind};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Resolve only the featured video of a playlist URL
    pub noplaylist: bool,
    /// Upper bound on listing pages walked by `resolve_listing`
    pub max_listing_pages: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            noplaylist: false,
            max_listing_pages: 50,
        }
    }
}

/// Result of resolving a URL of any supported kind
#[derive(Debug, Clone)]
pub enum Resolved {
    Video(Box<VideoMetadata>),
    Listing(Listing),
}

/// Stateless page resolver
#[derive(Clone)]
pub struct Resolver {
    fetcher: Arc<dyn PageFetcher>,
    options: ResolverOptions,
}

impl Resolver {
    /// Create a resolver over a page fetcher
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            options: ResolverOptions::default(),
        }
    }

    /// Set resolver options
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve only featured videos of playlist URLs
    pub fn with_noplaylist(mut self, noplaylist: bool) -> Self {
        self.options.noplaylist = noplaylist;
        self
    }

    /// Get resolver options
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve a video, embed or listing URL.
    ///
    /// Playlist URLs resolve to their listing unless `noplaylist` is set.
    pub async fn resolve_any(&self, url: &str, limit: Option<usize>) -> Result<Resolved, KvsError> {
        let kind = classify_url(url)?;
        match &kind {
            PageKind::Playlist { id, .. } if !self.options.noplaylist => {
                info!("Resolving playlist {}; use --no-playlist for the featured video only", id);
                Ok(Resolved::Listing(self.resolve_listing(url, limit).await?))
            }
            PageKind::Member { .. } => Ok(Resolved::Listing(self.resolve_listing(url, limit).await?)),
            _ => Ok(Resolved::Video(Box::new(self.resolve(url).await?))),
        }
    }

    /// Resolve a video or embed page to its metadata and ranked formats.
    ///
    /// A playlist URL resolves its featured video.
    pub async fn resolve(&self, url: &str) -> Result<VideoMetadata, KvsError> {
        let kind = classify_url(url)?;
        let url = match &kind {
            PageKind::Video { .. } | PageKind::Embed { .. } => url.to_string(),
            PageKind::Playlist { .. } => {
                let featured = playlist_video_url(url)?;
                info!("Resolving featured video {} of playlist {}", featured, kind.id());
                featured
            }
            PageKind::Member { .. } => {
                return Err(KvsError::UnsupportedUrl(format!(
                    "{} is a member listing, not a video page",
                    url
                )))
            }
        };

        debug!("Resolving {} ({})", url, kind.id());
        let requested = self.fetcher.fetch_page(&url).await?;

        let redirected = match (&kind, embed_alt_url(&requested)) {
            (PageKind::Embed { .. }, Some(main_url)) if main_url != url => {
                info!("Embed {} points at {}", url, main_url);
                match self.fetcher.fetch_page(&main_url).await {
                    Ok(markup) => Some(markup),
                    Err(e) => {
                        warn!("Could not fetch {}: {}; using the embed page", main_url, e);
                        None
                    }
                }
            }
            _ => None,
        };

        resolve_markup(&url, &requested, redirected.as_deref())
    }

    /// Collect the video links of a member or playlist listing
    pub async fn resolve_listing(&self, url: &str, limit: Option<usize>) -> Result<Listing, KvsError> {
        let kind = classify_url(url)?;
        if !kind.is_listing() {
            return Err(KvsError::UnsupportedUrl(format!("{} is not a listing", url)));
        }

        let first = self.fetcher.fetch_page(url).await?;
        let title = listing_title(&first).map(|title| match &kind {
            PageKind::Playlist { .. } => collapse_doubled_title(&title),
            _ => title,
        });

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut page_url = url.to_string();
        let mut markup = first;
        let mut page = 1;

        loop {
            let links = video_links(&markup, &kind);
            debug!("Page {} of {}: {} links", page, url, links.len());
            for link in links {
                if seen.insert(link.clone()) {
                    entries.push(link);
                }
            }

            if limit.map_or(false, |limit| entries.len() >= limit) {
                break;
            }
            if page >= self.options.max_listing_pages {
                warn!("Stopping after {} listing pages", page);
                break;
            }
            let Some(next) = next_page_url(url, &page_url, &markup) else {
                break;
            };

            page += 1;
            markup = match self.fetcher.fetch_page(&next).await {
                Ok(markup) => markup,
                Err(e) => {
                    warn!("Listing page {} failed: {}", next, e);
                    break;
                }
            };
            page_url = next;
        }

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        info!("Listing {} has {} videos", kind.id(), entries.len());

        Ok(Listing {
            id: kind.id().to_string(),
            title,
            entries,
        })
    }
}

/// Build video metadata from page markup.
///
/// `requested` is the markup of `url` itself; `redirected` the main page an
/// embed pointed at, when it was fetched. The title comes from the requested
/// page, everything else from the page holding the player.
pub fn resolve_markup(
    url: &str,
    requested: &str,
    redirected: Option<&str>,
) -> Result<VideoMetadata, KvsError> {
    let markup = redirected.unwrap_or(requested);

    check_access(markup)?;

    let flashvars = extract_flashvars(markup, url)?;
    let id = flashvars.video_id()?;
    info!("Found player configuration for video {}", id);

    let formats = assemble_formats(&flashvars, url)?;
    debug!(
        "Ranked formats: {}",
        formats
            .iter()
            .map(|f| f.format_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let title = extract_title(requested).or_else(|_| extract_title(markup))?;
    let (uploader, uploader_id) = extract_uploader(markup);

    let mut metadata = VideoMetadata::new(id, title, url.to_string());
    metadata.display_id = extract_display_id(markup);
    metadata.thumbnail = flashvars.thumbnail(url);
    metadata.uploader = uploader;
    metadata.uploader_id = uploader_id;
    metadata.formats = formats;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const VIDEO_URL: &str = "https://thisvid.com/videos/sitting-on-ball-tight-jeans/";
    const EMBED_URL: &str = "https://thisvid.com/embed/3533241/";
    const RESOLVED_URL: &str = "https://thisvid.com/get_file/7/7a35a1d2e4f6b8c0d9e7f5a3b1c2d4e6/3533000/3533241/3533241.mp4/?rnd=1700000000000";

    /// Serves canned pages and records every request
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn with_page(mut self, url: &str, markup: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), markup.into());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, KvsError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| KvsError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn video_page() -> String {
        r#"<!DOCTYPE html>
<html>
<head>
<title>Sitting on ball tight jeans - ThisVid.com</title>
<link href="https://thisvid.com/videos/sitting-on-ball-tight-jeans/" rel="canonical"/>
</head>
<body>
<div class="video-holder"><div id="kt_player"></div></div>
<script type="text/javascript">
    var flashvars = {
        video_id: '3533241',
        license_code: '$603368314383937',
        preview_url: '//media.thisvid.com/contents/videos_screenshots/3533000/3533241/preview.jpg',
        video_url: 'function/0/https://thisvid.com/get_file/7/39ae6b1d73dec70d8212fb5face564a4/3533000/3533241/3533241.mp4/?rnd=1700000000000',
        video_url_text: '480p',
        rnd: '1700000000000',
    };
    var player_obj = kt_player('kt_player', '/player/kt_player.swf', '100%', '100%', flashvars);
</script>
<div class="info"><span class="label">Added by: </span><a class="author" href="https://thisvid.com/members/150629/">jeanslevisjeans</a></div>
</body>
</html>"#
            .to_string()
    }

    fn embed_page() -> String {
        format!(
            "<html><head><title>Sitting on ball tight jeans - ThisVid tube</title></head><body>\
             <script>var flashvars = {{video_id: '3533241', video_alt_url: '{}', rnd: '1'}};</script>\
             </body></html>",
            VIDEO_URL
        )
    }

    fn private_page() -> String {
        r#"<html><head><title>Secret - ThisVid.com</title></head><body>
<div class="video-holder"><div class="message"><p>This video is a private video uploaded by someone.</p><p>Only friends can watch it.</p></div></div>
<script>var flashvars = {video_id: '1', video_url: 'function/0/broken'};</script>
</body></html>"#
            .to_string()
    }

    fn resolver(fetcher: StaticFetcher) -> (Resolver, Arc<StaticFetcher>) {
        let fetcher = Arc::new(fetcher);
        (Resolver::new(fetcher.clone()), fetcher)
    }

    #[tokio::test]
    async fn test_resolve_video_page() {
        let (resolver, fetcher) = resolver(StaticFetcher::default().with_page(VIDEO_URL, video_page()));

        let metadata = resolver.resolve(VIDEO_URL).await.unwrap();

        assert_eq!(metadata.id, "3533241");
        assert_eq!(metadata.title, "Sitting on ball tight jeans");
        assert_eq!(
            metadata.display_id.as_deref(),
            Some("sitting-on-ball-tight-jeans")
        );
        assert!(metadata.age_restricted);
        assert_eq!(metadata.uploader.as_deref(), Some("jeanslevisjeans"));
        assert_eq!(metadata.uploader_id.as_deref(), Some("150629"));
        assert_eq!(
            metadata.thumbnail.as_deref(),
            Some("https://media.thisvid.com/contents/videos_screenshots/3533000/3533241/preview.jpg")
        );

        assert_eq!(metadata.formats.len(), 1);
        let format = &metadata.formats[0];
        assert_eq!(format.url, RESOLVED_URL);
        assert_eq!(format.format_id, "480p");
        assert_eq!(format.height, Some(480));
        assert_eq!(format.referer(), Some(VIDEO_URL));
        assert_eq!(fetcher.requests(), vec![VIDEO_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_access_restricted() {
        let private_url = "https://thisvid.com/videos/secret/";
        let (resolver, fetcher) =
            resolver(StaticFetcher::default().with_page(private_url, private_page()));

        match resolver.resolve(private_url).await {
            Err(KvsError::AccessRestricted(message)) => {
                assert_eq!(message, "This video is a private video uploaded by someone.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fetcher.requests(), vec![private_url.to_string()]);
    }

    #[tokio::test]
    async fn test_embed_follows_main_page() {
        let (resolver, fetcher) = resolver(
            StaticFetcher::default()
                .with_page(EMBED_URL, embed_page())
                .with_page(VIDEO_URL, video_page()),
        );

        let metadata = resolver.resolve(EMBED_URL).await.unwrap();

        assert_eq!(metadata.id, "3533241");
        assert_eq!(metadata.webpage_url, EMBED_URL);
        assert_eq!(metadata.formats[0].url, RESOLVED_URL);
        assert_eq!(metadata.formats[0].referer(), Some(EMBED_URL));
        assert_eq!(metadata.uploader_id.as_deref(), Some("150629"));
        assert_eq!(
            fetcher.requests(),
            vec![EMBED_URL.to_string(), VIDEO_URL.to_string()]
        );
    }

    #[tokio::test]
    async fn test_embed_falls_back_when_main_page_fails() {
        let (resolver, _) = resolver(StaticFetcher::default().with_page(EMBED_URL, embed_page()));

        // the embed page carries no download URL of its own
        assert!(matches!(
            resolver.resolve(EMBED_URL).await,
            Err(KvsError::NoPlayableFormats)
        ));
    }

    #[tokio::test]
    async fn test_missing_configuration() {
        let (resolver, _) = resolver(
            StaticFetcher::default().with_page(VIDEO_URL, "<html><title>x</title></html>"),
        );
        assert!(matches!(
            resolver.resolve(VIDEO_URL).await,
            Err(KvsError::ConfigurationNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let (resolver, _) = resolver(StaticFetcher::default());
        assert!(matches!(
            resolver.resolve(VIDEO_URL).await,
            Err(KvsError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_member_url_is_not_a_video() {
        let (resolver, fetcher) = resolver(StaticFetcher::default());
        assert!(matches!(
            resolver.resolve("https://thisvid.com/members/150629/").await,
            Err(KvsError::UnsupportedUrl(_))
        ));
        assert!(fetcher.requests().is_empty());
    }

    fn member_page(links: &[&str], next: Option<&str>) -> String {
        let anchors: String = links
            .iter()
            .map(|slug| format!("<a href=\"https://thisvid.com/videos/{}/\">{}</a>\n", slug, slug))
            .collect();
        let pagination = match next {
            Some(href) => format!("<li class=\"pagination-next\"><a href=\"{}\">Next</a></li>", href),
            None => String::new(),
        };
        format!(
            "<html><head><meta property=\"og:title\" content=\"Rafflesia's Profile | ThisVid.com\"></head>\
             <body>{}<ul>{}</ul></body></html>",
            anchors, pagination
        )
    }

    #[tokio::test]
    async fn test_resolve_member_listing() {
        let first = "https://thisvid.com/members/2140501/";
        let second = "https://thisvid.com/members/2140501/2/";
        let (resolver, _) = resolver(
            StaticFetcher::default()
                .with_page(first, member_page(&["one", "two"], Some("/members/2140501/2/")))
                .with_page(second, member_page(&["two", "three"], None)),
        );

        let listing = resolver.resolve_listing(first, None).await.unwrap();

        assert_eq!(listing.id, "2140501");
        assert_eq!(listing.title.as_deref(), Some("Rafflesia's Profile"));
        assert_eq!(
            listing.entries,
            vec![
                "https://thisvid.com/videos/one/".to_string(),
                "https://thisvid.com/videos/two/".to_string(),
                "https://thisvid.com/videos/three/".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_relative_pagination_stays_under_listing_root() {
        let first = "https://thisvid.com/members/2140501/public_videos/";
        let second = "https://thisvid.com/members/2140501/public_videos/2/";
        let third = "https://thisvid.com/members/2140501/public_videos/3/";
        let (resolver, fetcher) = resolver(
            StaticFetcher::default()
                .with_page(first, member_page(&["one"], Some("2/")))
                .with_page(second, member_page(&["two"], Some("3/")))
                .with_page(third, member_page(&["three"], None)),
        );

        let listing = resolver.resolve_listing(first, None).await.unwrap();

        assert_eq!(listing.entries.len(), 3);
        assert_eq!(
            fetcher.requests(),
            vec![first.to_string(), second.to_string(), third.to_string()]
        );
    }

    #[tokio::test]
    async fn test_listing_limit_and_page_bound() {
        let first = "https://thisvid.com/members/2140501/";
        let (resolver, fetcher) = resolver(StaticFetcher::default().with_page(
            first,
            member_page(&["one", "two", "three"], Some("/members/2140501/2/")),
        ));

        let listing = resolver.resolve_listing(first, Some(2)).await.unwrap();
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(fetcher.requests().len(), 1);

        // a failing follow-up page ends the walk without an error
        let listing = resolver.resolve_listing(first, None).await.unwrap();
        assert_eq!(listing.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_playlist_noplaylist_resolves_featured_video() {
        let playlist_url = "https://thisvid.com/playlist/6615/video/sitting-on-ball-tight-jeans/";
        let fetcher = Arc::new(StaticFetcher::default().with_page(VIDEO_URL, video_page()));
        let resolver = Resolver::new(fetcher.clone()).with_noplaylist(true);

        match resolver.resolve_any(playlist_url, None).await.unwrap() {
            Resolved::Video(metadata) => assert_eq!(metadata.id, "3533241"),
            Resolved::Listing(_) => panic!("expected the featured video"),
        }
        assert_eq!(fetcher.requests(), vec![VIDEO_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_playlist_listing_title_collapses() {
        let playlist_url = "https://thisvid.com/playlist/6615/video/big-italian-booty-28/";
        let markup = "<html><head><title>Underwear Stuff - Underwear Stuff</title></head><body>\
                      <a href=\"https://thisvid.com/playlist/6615/video/big-italian-booty-28/\">a</a>\
                      </body></html>";
        let (resolver, _) = resolver(StaticFetcher::default().with_page(playlist_url, markup));

        match resolver.resolve_any(playlist_url, None).await.unwrap() {
            Resolved::Listing(listing) => {
                assert_eq!(listing.id, "6615");
                assert_eq!(listing.title.as_deref(), Some("Underwear Stuff"));
                assert_eq!(
                    listing.entries,
                    vec!["https://thisvid.com/videos/big-italian-booty-28/".to_string()]
                );
            }
            Resolved::Video(_) => panic!("expected a listing"),
        }
    }
}
