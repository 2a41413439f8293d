//! Bot de Discord: responde únicamente a los mensajes que mencionan al
//! bot, consultando el índice de workflows. La base de conocimiento se
//! carga una única vez en el evento `ready`; si llega una pregunta antes
//! de terminar la carga se responde con un mensaje fijo.

use std::sync::Arc;

use serenity::all::{Client, Context, EventHandler, GatewayIntents, Message, Ready};
use serenity::async_trait;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use workflow_rag_assistant::{
    config::AppConfig,
    corpus,
    llm::LlmManager,
    models::WorkflowRecord,
    rag,
    vector_store::{self, Collection, DocumentPolicy, VectorStore},
};

struct Handler {
    llm_manager: LlmManager,
    collection: Arc<Collection>,
    records: Vec<WorkflowRecord>,
    policy: DocumentPolicy,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Conectado a Discord como {}", ready.user.name);
        info!("Cargando la base de conocimiento...");
        if let Err(err) = vector_store::ensure_populated(
            &self.collection,
            &self.llm_manager,
            &self.records,
            self.policy,
        )
        .await
        {
            error!("Error al poblar el índice vectorial: {err}");
            return;
        }
        info!("El asistente está cargado y listo para responder preguntas.");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignorar los mensajes del propio bot (y de cualquier otro bot)
        if msg.author.bot {
            return;
        }

        match msg.mentions_me(&ctx.http).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                error!("No se pudo comprobar la mención: {err}");
                return;
            }
        }

        // Quitar el token de mención antes de tratar el texto como pregunta
        let bot_id = ctx.cache.current_user().id;
        let question = msg
            .content
            .replace(&format!("<@{bot_id}>"), "")
            .replace(&format!("<@!{bot_id}>"), "")
            .trim()
            .to_string();

        info!("Pregunta de {}: '{}'", msg.author.name, question);

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        let answer = if self.collection.is_populated() {
            match rag::rag_query(&self.llm_manager, &self.collection, &question, rag::TOP_K).await
            {
                Ok(answer) => answer,
                // Sin reintentos: se registra el fallo y se avisa en el canal.
                Err(err) => {
                    error!("Error al responder la consulta: {err}");
                    "Sorry, something went wrong while answering your question.".to_string()
                }
            }
        } else {
            "Sorry, my knowledge base is not loaded yet. Please try again in a moment.".to_string()
        };

        if let Err(err) = msg.channel_id.say(&ctx.http, answer).await {
            error!("No se pudo enviar la respuesta: {err}");
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");
    let token = cfg
        .discord_token
        .clone()
        .expect("Falta DISCORD_BOT_TOKEN en el entorno");

    let llm_manager = LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager");
    let records = corpus::load_corpus(&cfg.corpus_path).expect(
        "Error al leer el corpus. Ejecuta primero el binario prepare_data para generarlo",
    );

    let store = VectorStore::new();
    let collection = store.get_or_create(&cfg.collection_name);
    let policy = cfg.document_policy.unwrap_or(DocumentPolicy::FullText);

    let handler = Handler {
        llm_manager,
        collection,
        records,
        policy,
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .expect("Error creando el cliente de Discord");

    client
        .start()
        .await
        .expect("El cliente de Discord terminó con error");
}
