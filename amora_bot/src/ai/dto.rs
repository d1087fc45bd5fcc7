use serde::Deserialize;

/// The slice of an OpenRouter chat-completion response we consume.
#[derive(Deserialize, Debug)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
pub struct ChoiceMessage {
    pub content: String,
}
