//! Image prompt composition.
//!
//! A short subject such as "coffee" is expanded with a style, the space the
//! layout template keeps free for overlaid text, the template's proportions,
//! an optional color palette and a fixed quality suffix.

const DEFAULT_MODIFIERS: &str = "photorealistic, high quality";
const DEFAULT_TEXT_MODIFIERS: &str = "cinematic, professional";
const QUALITY_SUFFIX: &str = "8K resolution, ultra high quality, professional grade";
const TEXT_RENDERING_SUFFIX: &str =
    "bold typography, dramatic composition, high contrast, 8K resolution, professional design";

/// Named sets of visual modifiers.
///
/// The `to_string` and `FromStr` forms are accepted by `--style`.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    clap::ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Style {
    Cinematic,
    Photorealistic,
    Minimalist,
    Vibrant,
    Moody,
    Nature,
    Tech,
    Luxury,
}

impl Style {
    pub(crate) fn modifiers(&self) -> &'static str {
        match self {
            Style::Cinematic => {
                "cinematic lighting, depth of field, film noir, moody atmosphere, professional cinematography"
            }
            Style::Photorealistic => {
                "photorealistic, hyper-detailed, professional photography, 8K quality, studio lighting"
            }
            Style::Minimalist => {
                "minimalist design, clean composition, lots of white space, simple elegant lines"
            }
            Style::Vibrant => {
                "vibrant colors, high contrast, saturated palette, dynamic energy, bold composition"
            }
            Style::Moody => {
                "moody atmosphere, dark tones, dramatic shadows, mysterious lighting, atmospheric"
            }
            Style::Nature => {
                "natural lighting, organic elements, earth tones, botanical, garden aesthetic"
            }
            Style::Tech => {
                "futuristic, digital, neon accents, sci-fi elements, modern tech aesthetic, digital art"
            }
            Style::Luxury => {
                "luxury aesthetic, premium materials, gold accents, sophisticated, high-end styling"
            }
        }
    }
}

/// Layouts the generated image is placed into.
#[derive(
    Debug,
    Default,
    PartialEq,
    Eq,
    Clone,
    Copy,
    clap::ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum Template {
    /// The image fills the whole canvas
    FullImage,
    /// A text band above the image
    #[default]
    ImageText,
    /// Image on the left, text on the right
    TwoColumn,
    /// Centered image with solid margins
    Centered,
}

impl Template {
    /// The area the image must leave free for text.
    pub(crate) fn negative_space(&self) -> &'static str {
        match self {
            Template::FullImage => "no text areas, fill entire canvas with image",
            Template::ImageText => {
                "leave top 10% empty (50-100px height) for text overlay in solid color"
            }
            Template::TwoColumn => "leave right 50% empty with solid background for text content",
            Template::Centered => {
                "leave outer 8% margin as solid background color for spacing, center main content"
            }
        }
    }

    pub(crate) fn aspect_ratio(&self) -> &'static str {
        match self {
            Template::FullImage => "9:11.25 aspect ratio (1080x1350px)",
            Template::ImageText => {
                "image occupies 60% height, text area 40% height, 9:11.25 total aspect ratio"
            }
            Template::TwoColumn => {
                "left image 50% width, right text area 50% width, 9:11.25 total aspect ratio"
            }
            Template::Centered => {
                "centered composition with 8% margins on all sides, 9:11.25 total aspect ratio"
            }
        }
    }
}

/// A descriptive name for a hex color, if it is a well-known one.
pub(crate) fn color_name(hex: &str) -> Option<&'static str> {
    let hex = hex.trim().trim_start_matches('#').to_ascii_lowercase();

    let name = match hex.as_str() {
        "000000" => "black",
        "ffffff" => "white",
        "ff0000" => "red",
        "00ff00" => "green",
        "0000ff" => "blue",
        "ffff00" => "yellow",
        "ff00ff" => "magenta",
        "00ffff" => "cyan",
        "ff6600" => "orange",
        "800080" => "purple",
        "008000" => "dark green",
        "808080" => "gray",
        "4285f4" => "google blue",
        "ea4335" => "google red",
        "34a853" => "google green",
        "fbbc05" => "google yellow",
        "a2aaad" => "google gray",
        "555555" => "dark gray",
        _ => return None,
    };

    Some(name)
}

/// Everything that goes into one image prompt.
#[derive(Default)]
pub(crate) struct ImagePrompt<'a> {
    pub subject: &'a str,
    pub template: Template,
    pub style: Option<Style>,
    /// Primary, secondary and accent colors as hex; later entries are ignored.
    pub palette: &'a [String],
    /// Text to render inside the image instead of reserving space for it.
    pub text: Option<&'a str>,
}

impl ImagePrompt<'_> {
    pub(crate) fn compose(&self) -> String {
        let subject = self.subject.trim();

        match self.text.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => self.compose_with_text(subject, text),
            None => self.compose_with_space(subject),
        }
    }

    fn compose_with_space(&self, subject: &str) -> String {
        let mut parts = vec![
            subject.to_string(),
            self.style
                .map_or(DEFAULT_MODIFIERS, |style| style.modifiers())
                .to_string(),
            self.template.negative_space().to_string(),
            self.template.aspect_ratio().to_string(),
        ];

        let colors: Vec<&str> = self
            .palette
            .iter()
            .zip(["primary", "secondary", "accent"])
            .map(|(hex, role)| color_name(hex).unwrap_or(role))
            .collect();

        if !colors.is_empty() {
            parts.push(format!("color palette: {}", colors.join(", ")));
        }

        parts.push(QUALITY_SUFFIX.to_string());

        parts.join(", ")
    }

    fn compose_with_text(&self, subject: &str, text: &str) -> String {
        let modifiers = self
            .style
            .map_or(DEFAULT_TEXT_MODIFIERS, |style| style.modifiers());

        if subject.is_empty() {
            format!(
                "Render the word \"{}\" in {}, {}, centered, artistic effects",
                text, modifiers, TEXT_RENDERING_SUFFIX
            )
        } else {
            format!(
                "Background: {}, with text \"{}\" rendered {}, {}",
                subject, text, modifiers, TEXT_RENDERING_SUFFIX
            )
        }
    }
}
