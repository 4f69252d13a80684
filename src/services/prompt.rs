use crate::core::config::AudioConfig;
use crate::core::state::{BackgroundMode, Gender, Persona};

/// Framings requested for every persona, one image each.
pub const SHOT_VARIATIONS: [&str; 3] = ["Full shot", "Medium shot", "Atmospheric portrait"];

pub fn build_image_prompt(persona: &Persona) -> String {
    let background = if persona.background_mode == BackgroundMode::Description {
        format!("Background: {}.", persona.background_value)
    } else {
        String::new()
    };
    let context = if persona.scene_context.is_empty() {
        "Standing naturally.".to_string()
    } else {
        format!("Character is {}.", persona.scene_context)
    };

    format!(
        "Professional photo of {}, {}, {}y. {}. Style: {}. Personality: {}. {} {} High quality, 8k.",
        persona.name,
        persona.gender,
        persona.age,
        persona.physical_traits,
        persona.style,
        persona.personality,
        context,
        background,
    )
}

pub fn shot_prompt(base: &str, variation: &str) -> String {
    format!("{} Shot: {}", base, variation)
}

pub fn clone_instruction(persona: &Persona, script: &str) -> String {
    format!(
        "Strictly follow the tone, accent and voice of the provided audio. As {}, say exactly: {}",
        persona.name, script
    )
}

pub fn prebuilt_instruction(persona: &Persona, script: &str) -> String {
    format!("As {} ({}), say: {}", persona.name, persona.accent, script)
}

pub fn fallback_voice<'a>(gender: Gender, audio: &'a AudioConfig) -> &'a str {
    match gender {
        Gender::Feminino => &audio.female_voice,
        Gender::Masculino => &audio.male_voice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_prompt_with_description_background() {
        let persona = Persona::default();
        assert_eq!(
            build_image_prompt(&persona),
            "Professional photo of Ana Clara, Feminino, 28y. \
             Cabelos castanhos longos, pele clara, sorriso gentil. \
             Style: Elegante e discreta. \
             Personality: Gentil, educada, firme na fé e comunicativa. \
             Character is Sorrindo serenamente para a foto. \
             Background: Um jardim florido ao entardecer. High quality, 8k."
        );
    }

    #[test]
    fn test_base_prompt_defaults_context_and_skips_url_background() {
        let persona = Persona {
            scene_context: String::new(),
            background_mode: BackgroundMode::Url,
            background_value: "https://example.com/bg.png".to_string(),
            ..Persona::default()
        };
        let prompt = build_image_prompt(&persona);
        assert!(prompt.contains("Standing naturally.  High quality, 8k."));
        assert!(!prompt.contains("Background:"));
        assert!(!prompt.contains("example.com"));
    }

    #[test]
    fn test_shot_prompt() {
        assert_eq!(shot_prompt("Base.", SHOT_VARIATIONS[2]), "Base. Shot: Atmospheric portrait");
    }

    #[test]
    fn test_voice_instructions() {
        let persona = Persona::default();
        assert_eq!(
            prebuilt_instruction(&persona, "Olá!"),
            "As Ana Clara (Carioca suave), say: Olá!"
        );
        assert!(clone_instruction(&persona, "Olá!").ends_with("As Ana Clara, say exactly: Olá!"));
    }

    #[test]
    fn test_fallback_voice_by_gender() {
        let audio = AudioConfig::default();
        assert_eq!(fallback_voice(Gender::Feminino, &audio), "Kore");
        assert_eq!(fallback_voice(Gender::Masculino, &audio), "Zephyr");
    }
}
