//! Tool Schema Registry
//!
//! Static catalog of the capabilities the model may call: names, required
//! parameters and parameter types. Built once and shared read-only.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::dispatch::{ArgSpec, CallDescriptor};
use crate::error::RegistryError;
use crate::types::ToolDefinition;

pub const SEND_MESSAGE_TOOL: &str = "SEND_Mensagem";
pub const ENTER_CHANNEL_TOOL: &str = "EnterChannel";
pub const WEB_SEARCH_TOOL: &str = "WebSearch";

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    Boolean,
    String,
    Array,
    Object,
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn new(ty: ParamType, description: &str) -> Self {
        Self {
            ty,
            description: description.to_string(),
            minimum: None,
            maximum: None,
            enum_values: None,
        }
    }

    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// One capability the model can request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// Required parameter names, in declaration order.
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    /// Capability this tool dispatches to. Tools without one are
    /// advertised but report "Function not available" when called.
    #[serde(skip)]
    pub call: Option<CallDescriptor>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: Vec::new(),
            properties: BTreeMap::new(),
            call: None,
        }
    }

    /// Route calls to `capability` with `args` as the positional order.
    pub fn calls(mut self, capability: &'static str, args: &'static [ArgSpec]) -> Self {
        self.call = Some(CallDescriptor::new(capability, args));
        self
    }

    /// Declare a required parameter.
    pub fn param(mut self, name: &str, schema: PropertySchema) -> Self {
        self.required.push(name.to_string());
        self.properties.insert(name.to_string(), schema);
        self
    }

    /// Declare an optional parameter.
    pub fn optional(mut self, name: &str, schema: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    /// JSON Schema object for the parameters.
    pub fn parameters_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, prop)| {
                (
                    name.clone(),
                    serde_json::to_value(prop).unwrap_or_else(|_| json!({})),
                )
            })
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable catalog of tool schemas.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSchema>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from custom schemas.
    pub fn new(tools: Vec<ToolSchema>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateTool(tool.name.clone()));
            }
            if let Some(param) = tool
                .required
                .iter()
                .find(|p| !tool.properties.contains_key(p.as_str()))
            {
                return Err(RegistryError::UndeclaredRequired {
                    tool: tool.name.clone(),
                    param: param.clone(),
                });
            }
        }
        Ok(Self { tools, index })
    }

    /// The built-in Discord bot catalog. Names are unique and every
    /// required parameter is declared, so no checks run here.
    pub fn builtin() -> Self {
        let tools = builtin_tools();
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { tools, index }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&CallDescriptor> {
        self.get(name).and_then(|t| t.call.as_ref())
    }

    /// Tool names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider-neutral definitions advertised to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters_json(),
            })
            .collect()
    }
}

fn guild_id() -> PropertySchema {
    PropertySchema::new(ParamType::Integer, "ID do servidor Discord")
}

fn voice_channel_id() -> PropertySchema {
    PropertySchema::new(ParamType::Integer, "ID do canal de voz")
}

const GUILD: &[ArgSpec] = &[ArgSpec::Int("guild_id")];

fn builtin_tools() -> Vec<ToolSchema> {
    use ArgSpec::*;
    use ParamType::*;

    vec![
        ToolSchema::new("GET_Canais", "Lista todos os canais de voz do servidor Discord")
            .param("guild_id", guild_id())
            .calls("list_voice_channels", GUILD),
        ToolSchema::new(
            "GET_UserVoiceChannel",
            "Encontra o canal de voz onde o usuário está atualmente",
        )
        .param("guild_id", guild_id())
        .param("user_id", PropertySchema::new(Integer, "ID do usuário Discord"))
        .calls("get_user_voice_channel", &[Int("guild_id"), Int("user_id")]),
        ToolSchema::new(
            SEND_MESSAGE_TOOL,
            "Envia uma mensagem de texto no canal Discord. Esta é a ÚNICA ferramenta permitida para enviar respostas ao usuário.",
        )
        .param(
            "channel_id",
            PropertySchema::new(Integer, "ID do canal Discord onde enviar a mensagem"),
        )
        .param("text", PropertySchema::new(String, "Texto da mensagem a ser enviada"))
        .calls("send_message", &[Int("channel_id"), Str("text")]),
        ToolSchema::new(
            ENTER_CHANNEL_TOOL,
            "Entra em um canal de voz do Discord especificado por channel_id. \
             Caso não tenha o channel_id, use a ferramenta GET_UserVoiceChannel para obter o canal de voz atual do usuário. \
             Caso o usuário não esteja em nenhum canal de voz, use a ferramenta GET_Canais para obter a lista de canais disponíveis.",
        )
        .param("guild_id", guild_id())
        .param("channel_id", voice_channel_id())
        .calls("join_voice_channel", &[Int("guild_id"), Int("channel_id")]),
        ToolSchema::new("LeaveChannel", "Sai do canal de voz do Discord")
            .param("guild_id", guild_id())
            .calls("leave_music", GUILD),
        ToolSchema::new("MusicPlay", "Toca música do YouTube ou Spotify")
            .param("guild_id", guild_id())
            .param("channel_id", voice_channel_id())
            .param(
                "query",
                PropertySchema::new(String, "Nome da música, URL do YouTube ou URI do Spotify"),
            )
            .calls(
                "play_music",
                &[Int("guild_id"), Int("channel_id"), Str("query")],
            ),
        ToolSchema::new("MusicStop", "Para a música e limpa a fila")
            .param("guild_id", guild_id())
            .calls("stop_music", GUILD),
        ToolSchema::new("MusicSkip", "Pula a música atual")
            .param("guild_id", guild_id())
            .calls("skip_music", GUILD),
        ToolSchema::new("MusicPause", "Pausa a reprodução de música")
            .param("guild_id", guild_id())
            .calls("pause_music", GUILD),
        ToolSchema::new("MusicResume", "Retoma a reprodução de música pausada")
            .param("guild_id", guild_id())
            .calls("resume_music", GUILD),
        ToolSchema::new("MusicVolume", "Ajusta o volume da música (0-100)")
            .param("guild_id", guild_id())
            .param(
                "volume",
                PropertySchema::new(Integer, "Volume entre 0 e 100").range(0, 100),
            )
            .calls("set_volume", &[Int("guild_id"), Int("volume")]),
        ToolSchema::new(
            "GET_MusicQueue",
            "Retorna a fila de músicas atual com opções de filtragem e formatação",
        )
        .param("guild_id", guild_id())
        .optional(
            "limit",
            PropertySchema::new(Integer, "Número máximo de itens da fila a retornar (padrão: todos)"),
        )
        .optional(
            "info_level",
            PropertySchema::new(
                String,
                "Nível de informação: 'all' (título, url, duração, artistas), 'name' (apenas título), 'link' (título e url), 'minimal' (título e posição)",
            )
            .one_of(&["all", "name", "link", "minimal"]),
        )
        .optional(
            "offset",
            PropertySchema::new(Integer, "Posição inicial na fila para paginação (padrão: 0)"),
        )
        .optional(
            "include_current",
            PropertySchema::new(Boolean, "Incluir música atual em reprodução (padrão: true)"),
        )
        .calls(
            "get_queue",
            &[
                Int("guild_id"),
                OptInt("limit"),
                OptStr("info_level", "all"),
                OptIntDefault("offset", 0),
                OptBool("include_current", true),
            ],
        ),
        ToolSchema::new(
            "MusicSpotifyPlay",
            "Toca uma música, playlist ou álbum específico do Spotify usando URI",
        )
        .param("guild_id", guild_id())
        .param("channel_id", voice_channel_id())
        .param(
            "spotify_uri",
            PropertySchema::new(String, "URI do Spotify (track, playlist ou album)"),
        )
        .calls(
            "play_spotify_music",
            &[Int("guild_id"), Int("channel_id"), Str("spotify_uri")],
        ),
        ToolSchema::new("MusicLeave", "Sai do canal de voz e limpa todos os recursos de música")
            .param("guild_id", guild_id())
            .calls("leave_music", GUILD),
        ToolSchema::new("TTSSpeak", "Fala um texto usando síntese de voz (TTS)")
            .param("guild_id", guild_id())
            .param("channel_id", voice_channel_id())
            .param("text", PropertySchema::new(String, "Texto a ser convertido em fala"))
            .calls(
                "speak_tts",
                &[Int("guild_id"), Int("channel_id"), Str("text")],
            ),
        ToolSchema::new(
            WEB_SEARCH_TOOL,
            "Searches the web for current information, news, facts, or any topic. Use this when you need up-to-date information that may not be in your training data.",
        )
        .param(
            "query",
            PropertySchema::new(String, "The search query to look up on the web"),
        )
        .calls("web_search", &[Str("query")]),
    ]
}
