pub mod homework_llm;
pub mod images;
pub mod kv_store;
pub mod openai_http;
pub mod practice_llm;
pub mod realtime;
pub mod video;
pub mod ws_audio;

pub use homework_llm::OpenAiHomeworkAdapter;
pub use images::OpenAiImageAdapter;
pub use kv_store::SqliteKeyValueStore;
pub use openai_http::OpenAiHttp;
pub use practice_llm::OpenAiPracticeAdapter;
pub use realtime::OpenAiRealtimeConnector;
pub use video::OpenAiVideoAdapter;
pub use ws_audio::{InstantClock, WsMicrophone, WsPlaybackSink};
