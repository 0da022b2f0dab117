//! Page components
//!
//! Each component returns a render tree so pending children stream in place.

use streamchat_domain::{Author, ChatId, RenderNode, escape_attr, escape_text, runtime_script};

/// Path of the compiled client bundle under `/static`
pub const CLIENT_BUNDLE: &str = "/static/streamchat_client.js";

pub const COMPLETION_ROUTE: &str = "/chat/completion";
pub const MESSAGES_SWAP: &str = "beforeend:.messages";

/// Full HTML document around `body`
pub fn document(title: &str, body: RenderNode) -> RenderNode {
    let head = format!(
        "<!DOCTYPE html><html lang=\"en\"><head>\
         <meta charset=\"utf-8\">\
         <title>{title}</title>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
         <link rel=\"stylesheet\" href=\"/static/styles.css\">\
         {runtime}\
         <script type=\"module\">import init from \"{CLIENT_BUNDLE}\";init();</script>\
         </head>\
         <body class=\"relative min-h-screen min-w-screen flex flex-col\">\
         <header class=\"sticky top-0 bg-fuchsia-500 text-white text-center py-4\"><h1>{title}</h1></header>",
        title = escape_text(title),
        runtime = runtime_script(),
    );
    RenderNode::wrap(head, body, "</body></html>")
}

/// Message list plus the submission form for `chat_id`
pub fn chat_view(chat_id: ChatId, messages: RenderNode) -> RenderNode {
    let open = format!(
        "<div class=\"flex flex-col-reverse flex-1 container mx-auto\">\
         <div class=\"chat-container sticky bg-white bottom-0 border-t border-gray-300\">\
         <form method=\"POST\" class=\"flex p-4 m-0 gap-2\" enctype=\"application/x-www-form-urlencoded\" \
         data-stream=\"{action}\" data-stream-swap=\"{swap}\">\
         <input type=\"hidden\" name=\"chatId\" value=\"{chat_id}\">\
         <textarea class=\"flex-1 p-2 border resize-none\" placeholder=\"Type your message...\" name=\"text\"></textarea>\
         <div class=\"flex items-end\">\
         <button type=\"submit\" class=\"px-4 py-2 bg-fuchsia-500 text-white\">Send</button>\
         </div></form></div>\
         <div class=\"messages flex-1 overflow-y-auto p-4 pb-24\">",
        action = escape_attr(COMPLETION_ROUTE),
        swap = escape_attr(MESSAGES_SWAP),
    );
    RenderNode::wrap(open, messages, "</div></div>")
}

fn message_open(author: Author) -> String {
    format!(
        "<div class=\"chat-message flex my-2\">\
         <span class=\"mr-2 font-bold border-r border-fuchsia-500 w-full max-w-[40px]\">{author}:</span>\
         <pre class=\"text-gray-700 whitespace-pre-wrap break-words\">"
    )
}

const MESSAGE_CLOSE: &str = "</pre></div>";

/// One chat message; `body` may still be pending
pub fn chat_message(author: Author, body: RenderNode) -> RenderNode {
    RenderNode::wrap(message_open(author), body, MESSAGE_CLOSE)
}

/// A chat message whose body is plain text
pub fn chat_message_markup(author: Author, text: &str) -> String {
    format!("{}{}{MESSAGE_CLOSE}", message_open(author), escape_text(text))
}

pub fn error_message(text: &str) -> String {
    format!("<p class=\"text-red-500\">{}</p>", escape_text(text))
}
