//! Topical image selection for replies.
//!
//! Matches the question and answer text against a fixed topic taxonomy, then
//! builds image URLs for the top matches: AI-generated pollinations.ai
//! images keyed by a prompt derived from the question, Pexels search when an
//! API key is configured, and picsum placeholders as the floor. Image work
//! never fails a reply.

use crate::reply::TopicalImage;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// One taxonomy category: match keywords and a display label.
struct TopicCategory {
    keywords: &'static [&'static str],
    label: &'static str,
}

const TOPIC_CATEGORIES: &[TopicCategory] = &[
    TopicCategory {
        keywords: &[
            "code",
            "coding",
            "programming",
            "software",
            "developer",
            "computer",
            "algorithm",
            "function",
            "variable",
            "debug",
            "javascript",
            "python",
            "java",
        ],
        label: "Programming & Code",
    },
    TopicCategory {
        keywords: &[
            "nature", "tree", "forest", "mountain", "ocean", "landscape", "environment",
            "wildlife", "plants", "natural",
        ],
        label: "Nature & Landscape",
    },
    TopicCategory {
        keywords: &[
            "science",
            "research",
            "experiment",
            "laboratory",
            "chemistry",
            "physics",
            "biology",
            "scientific",
        ],
        label: "Science & Research",
    },
    TopicCategory {
        keywords: &[
            "business",
            "finance",
            "money",
            "economy",
            "marketing",
            "startup",
            "entrepreneur",
            "corporate",
        ],
        label: "Business & Finance",
    },
    TopicCategory {
        keywords: &[
            "art", "painting", "design", "creative", "artist", "museum", "drawing", "artistic",
        ],
        label: "Art & Design",
    },
    TopicCategory {
        keywords: &[
            "travel",
            "vacation",
            "tourism",
            "destination",
            "journey",
            "adventure",
            "trip",
            "explore",
        ],
        label: "Travel & Adventure",
    },
    TopicCategory {
        keywords: &[
            "food",
            "cooking",
            "recipe",
            "restaurant",
            "cuisine",
            "meal",
            "dish",
            "dosa",
            "idli",
            "indian",
            "breakfast",
            "dinner",
        ],
        label: "Food & Cuisine",
    },
    TopicCategory {
        keywords: &[
            "health", "fitness", "exercise", "wellness", "medical", "yoga", "workout", "healthy",
        ],
        label: "Health & Fitness",
    },
    TopicCategory {
        keywords: &[
            "technology",
            "tech",
            "innovation",
            "digital",
            "ai",
            "robot",
            "artificial intelligence",
            "machine learning",
        ],
        label: "Technology & Innovation",
    },
    TopicCategory {
        keywords: &[
            "education",
            "learning",
            "study",
            "school",
            "university",
            "student",
            "teaching",
            "academic",
        ],
        label: "Education & Learning",
    },
    TopicCategory {
        keywords: &[
            "music", "song", "instrument", "concert", "melody", "audio", "band", "guitar", "piano",
        ],
        label: "Music & Performance",
    },
    TopicCategory {
        keywords: &[
            "space", "astronomy", "planet", "star", "galaxy", "universe", "cosmos", "nasa",
            "rocket",
        ],
        label: "Space & Astronomy",
    },
    TopicCategory {
        keywords: &[
            "sports",
            "game",
            "football",
            "basketball",
            "cricket",
            "athlete",
            "competition",
            "soccer",
        ],
        label: "Sports & Athletics",
    },
    TopicCategory {
        keywords: &[
            "architecture",
            "building",
            "construction",
            "structure",
            "skyscraper",
        ],
        label: "Architecture & Buildings",
    },
    TopicCategory {
        keywords: &["animal", "pet", "dog", "cat", "bird", "zoo"],
        label: "Animals & Wildlife",
    },
    TopicCategory {
        keywords: &["car", "vehicle", "automobile", "transportation", "driving"],
        label: "Vehicles & Transportation",
    },
    TopicCategory {
        keywords: &["beach", "sea", "sand", "wave", "coast"],
        label: "Beach & Ocean",
    },
    TopicCategory {
        keywords: &["city", "urban", "metropolitan", "downtown", "skyline"],
        label: "City & Urban Life",
    },
];

/// Topics matched in the text, ordered by keyword hit count.
fn match_topics(text: &str) -> Vec<(&'static str, usize)> {
    let lower = text.to_lowercase();
    let mut matched: Vec<(&'static str, usize)> = TOPIC_CATEGORIES
        .iter()
        .filter_map(|cat| {
            let hits = cat.keywords.iter().filter(|k| lower.contains(*k)).count();
            (hits > 0).then_some((cat.label, hits))
        })
        .collect();
    matched.sort_by(|a, b| b.1.cmp(&a.1));
    matched
}

/// Prompt tuning per topic, so pollinations gets a usable art direction.
fn image_prompt(question: &str, label: &str) -> String {
    let label = label.to_lowercase();
    let style = if label.contains("programming") || label.contains("technology") {
        "technical diagram, professional illustration, detailed visualization, high quality"
    } else if label.contains("food") {
        "professional food photography, detailed close-up, appetizing presentation"
    } else if label.contains("science") || label.contains("space") {
        "scientific diagram, detailed illustration, educational visualization, high quality"
    } else if label.contains("nature") || label.contains("beach") {
        "nature photography, detailed view, high quality, professional"
    } else if label.contains("art") || label.contains("music") {
        "artistic visualization, creative illustration, high quality"
    } else {
        "detailed illustration, professional diagram, educational visualization, high quality"
    };
    format!("{question}, {style}")
}

fn pollinations_image(prompt: &str, label: &str, seed: i64) -> TopicalImage {
    let url = format!(
        "https://image.pollinations.ai/prompt/{}?width=400&height=300&nologo=true&seed={seed}",
        urlencoding::encode(prompt)
    );
    TopicalImage {
        url,
        label: label.to_string(),
        photographer: "AI Generated".to_string(),
        source: "pollinations.ai".to_string(),
        alt: Some(prompt.to_string()),
    }
}

fn picsum_placeholder(label: &str, seed: i64) -> TopicalImage {
    TopicalImage {
        url: format!("https://picsum.photos/400/300?random={seed}"),
        label: label.to_string(),
        photographer: "Placeholder".to_string(),
        source: "picsum".to_string(),
        alt: None,
    }
}

// ── Pexels ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
    #[serde(default)]
    photographer: String,
    #[serde(default)]
    alt: String,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    medium: String,
}

/// Topical image provider.
#[derive(Debug, Clone)]
pub struct ImageFinder {
    pexels_api_key: Option<String>,
    client: reqwest::Client,
}

impl ImageFinder {
    pub fn new(pexels_api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            pexels_api_key,
            client,
        }
    }

    /// Derive images for a question/answer pair. Always returns at least one
    /// image; failures degrade toward placeholders.
    pub async fn find(&self, question: &str, answer: &str) -> Vec<TopicalImage> {
        let combined = format!("{question} {answer}");
        let topics = match_topics(&combined);
        let base_seed = Utc::now().timestamp_millis();

        if topics.is_empty() {
            debug!("no topic matched, using generic AI image");
            let prompt = format!("{question}, educational illustration, professional quality");
            return vec![pollinations_image(&prompt, "General Topic", base_seed)];
        }

        let mut images = Vec::new();
        for (i, (label, hits)) in topics.into_iter().take(2).enumerate() {
            debug!(label, hits, "matched image topic");
            let seed = base_seed + i as i64;
            if let Some(photo) = self.pexels_search(label).await {
                images.push(photo);
            } else {
                let prompt = image_prompt(question, label);
                images.push(pollinations_image(&prompt, label, seed));
            }
        }
        if images.is_empty() {
            images.push(picsum_placeholder("General Topic", base_seed));
        }
        images
    }

    /// One Pexels photo for the topic, or `None` without a key or on any
    /// API trouble.
    async fn pexels_search(&self, query: &str) -> Option<TopicalImage> {
        let api_key = self.pexels_api_key.as_deref()?;
        let url = format!(
            "https://api.pexels.com/v1/search?query={}&per_page=1&orientation=landscape",
            urlencoding::encode(query)
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", api_key)
            .send()
            .await;
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), "Pexels search failed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Pexels request failed");
                return None;
            }
        };
        let parsed: PexelsResponse = response.json().await.ok()?;
        let photo = parsed.photos.into_iter().next()?;
        Some(TopicalImage {
            url: photo.src.medium,
            label: query.to_string(),
            photographer: photo.photographer,
            source: "pexels".to_string(),
            alt: (!photo.alt.is_empty()).then_some(photo.alt),
        })
    }
}
