use crate::utils::media::InlineMedia;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Gender {
    Masculino,
    #[default]
    Feminino,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Feminino, Gender::Masculino];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Masculino => "Masculino",
            Gender::Feminino => "Feminino",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "masculino" => Ok(Gender::Masculino),
            "feminino" => Ok(Gender::Feminino),
            other => Err(anyhow!("Unknown gender: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    #[default]
    Description,
    Upload,
    Url,
}

impl BackgroundMode {
    pub const ALL: [BackgroundMode; 3] = [
        BackgroundMode::Description,
        BackgroundMode::Upload,
        BackgroundMode::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundMode::Description => "description",
            BackgroundMode::Upload => "upload",
            BackgroundMode::Url => "url",
        }
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "description" => Ok(BackgroundMode::Description),
            "upload" => Ok(BackgroundMode::Upload),
            "url" => Ok(BackgroundMode::Url),
            other => Err(anyhow!("Unknown background mode: {}", other)),
        }
    }
}

/// Editable text-like fields of the persona form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersonaField {
    Name,
    Description,
    Gender,
    Age,
    Country,
    Region,
    Accent,
    Style,
    PhysicalTraits,
    Personality,
    BackgroundMode,
    BackgroundValue,
    SceneContext,
}

impl PersonaField {
    pub const ALL: [PersonaField; 13] = [
        PersonaField::Name,
        PersonaField::Description,
        PersonaField::Gender,
        PersonaField::Age,
        PersonaField::Country,
        PersonaField::Region,
        PersonaField::Accent,
        PersonaField::Style,
        PersonaField::PhysicalTraits,
        PersonaField::Personality,
        PersonaField::BackgroundMode,
        PersonaField::BackgroundValue,
        PersonaField::SceneContext,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PersonaField::Name => "Name",
            PersonaField::Description => "Description",
            PersonaField::Gender => "Gender",
            PersonaField::Age => "Age",
            PersonaField::Country => "Country",
            PersonaField::Region => "Region",
            PersonaField::Accent => "Accent",
            PersonaField::Style => "Style",
            PersonaField::PhysicalTraits => "Physical traits",
            PersonaField::Personality => "Personality",
            PersonaField::BackgroundMode => "Background mode",
            PersonaField::BackgroundValue => "Background",
            PersonaField::SceneContext => "Scene context",
        }
    }
}

impl fmt::Display for PersonaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Persona {
    pub name: String,
    pub description: String,
    pub gender: Gender,
    pub age: u32,
    pub country: String,
    pub region: String,
    pub accent: String,
    pub style: String,
    pub physical_traits: String,
    pub personality: String,
    pub reference_image: Option<InlineMedia>,
    pub reference_audio: Option<InlineMedia>,
    pub background_mode: BackgroundMode,
    pub background_value: String,
    pub scene_context: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Ana Clara".to_string(),
            description: "Carioca, 28 anos, estilo evangélico moderno, elegante e discreta."
                .to_string(),
            gender: Gender::Feminino,
            age: 28,
            country: "Brasil".to_string(),
            region: "Rio de Janeiro".to_string(),
            accent: "Carioca suave".to_string(),
            style: "Elegante e discreta".to_string(),
            physical_traits: "Cabelos castanhos longos, pele clara, sorriso gentil".to_string(),
            personality: "Gentil, educada, firme na fé e comunicativa".to_string(),
            reference_image: None,
            reference_audio: None,
            background_mode: BackgroundMode::Description,
            background_value: "Um jardim florido ao entardecer".to_string(),
            scene_context: "Sorrindo serenamente para a foto".to_string(),
        }
    }
}

impl Persona {
    /// Current value of a field, formatted for editing.
    pub fn field(&self, field: PersonaField) -> String {
        match field {
            PersonaField::Name => self.name.clone(),
            PersonaField::Description => self.description.clone(),
            PersonaField::Gender => self.gender.to_string(),
            PersonaField::Age => self.age.to_string(),
            PersonaField::Country => self.country.clone(),
            PersonaField::Region => self.region.clone(),
            PersonaField::Accent => self.accent.clone(),
            PersonaField::Style => self.style.clone(),
            PersonaField::PhysicalTraits => self.physical_traits.clone(),
            PersonaField::Personality => self.personality.clone(),
            PersonaField::BackgroundMode => self.background_mode.to_string(),
            PersonaField::BackgroundValue => self.background_value.clone(),
            PersonaField::SceneContext => self.scene_context.clone(),
        }
    }

    /// Applies a form edit. Invalid enumerations and non-positive ages are rejected
    /// and leave the persona unchanged.
    pub fn set_field(&mut self, field: PersonaField, value: &str) -> Result<()> {
        match field {
            PersonaField::Name => self.name = value.to_string(),
            PersonaField::Description => self.description = value.to_string(),
            PersonaField::Gender => self.gender = value.parse()?,
            PersonaField::Age => self.set_age(value)?,
            PersonaField::Country => self.country = value.to_string(),
            PersonaField::Region => self.region = value.to_string(),
            PersonaField::Accent => self.accent = value.to_string(),
            PersonaField::Style => self.style = value.to_string(),
            PersonaField::PhysicalTraits => self.physical_traits = value.to_string(),
            PersonaField::Personality => self.personality = value.to_string(),
            PersonaField::BackgroundMode => self.background_mode = value.parse()?,
            PersonaField::BackgroundValue => self.background_value = value.to_string(),
            PersonaField::SceneContext => self.scene_context = value.to_string(),
        }
        Ok(())
    }

    fn set_age(&mut self, value: &str) -> Result<()> {
        let age: u32 = value
            .trim()
            .parse()
            .map_err(|_| anyhow!("Age must be a whole number, got '{}'", value))?;
        if age == 0 {
            return Err(anyhow!("Age must be positive"));
        }
        self.age = age;
        Ok(())
    }

    /// Short profile card shown next to results.
    pub fn card(&self) -> String {
        let mut s = format!("{} ({}, {})\n", self.name, self.gender, self.age);
        s.push_str(&format!("{} / {}, accent: {}\n", self.region, self.country, self.accent));
        s.push_str(&format!("Style: {}\n", self.style));
        s.push_str(&format!("Traits: {}\n", self.physical_traits));
        s.push_str(&format!("Personality: {}", self.personality));
        if self.reference_image.is_some() {
            s.push_str("\n[reference image loaded]");
        }
        if self.reference_audio.is_some() {
            s.push_str("\n[reference voice loaded]");
        }
        s
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
    Success,
    Error,
}

impl GenerationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, GenerationState::Generating)
    }
}

/// One finished generation run. Never mutated once built.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationResult {
    pub id: i64,
    pub name: String,
    pub date: String,
    pub images: Vec<InlineMedia>,
    pub audio_base64: Option<String>,
    pub used_prompt: String,
    pub persona: Persona,
}
