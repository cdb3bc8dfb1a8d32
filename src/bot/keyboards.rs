use crate::engine::Button;
use crate::engine::Keyboard;

pub fn cancel(cancel_data: &str) -> Keyboard {
  Keyboard::new().button(Button::callback("❌ Cancel", cancel_data))
}

pub fn back_cancel(back_data: &str, cancel_data: &str) -> Keyboard {
  Keyboard::new().row(vec![
    Button::callback("⬅️ Back", back_data),
    Button::callback("❌ Cancel", cancel_data),
  ])
}

pub fn confirm_cancel(confirm_data: &str, cancel_data: &str) -> Keyboard {
  Keyboard::new().row(vec![
    Button::callback("✅ Confirm", confirm_data),
    Button::callback("❌ Cancel", cancel_data),
  ])
}

pub fn link(label: &str, url: &str) -> Keyboard {
  Keyboard::new().button(Button::url(label, url))
}
